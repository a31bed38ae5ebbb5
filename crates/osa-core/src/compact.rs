// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use osa_config::CompactionStrategy;
use osa_model::{FunctionCall, Message, MessageContent, Role};
use osa_tools::OutputCategory;

// ─── Compaction prompts ───────────────────────────────────────────────────────

const SUMMARIZE_PROMPT: &str =
    "You are a context compaction assistant. Summarise the following conversation history \
     in a concise, information-dense way. Preserve all technical details, decisions, file \
     names, code snippets, and tool outputs that may be relevant to future work. \
     The summary will replace the original history to free up context space.";

const STRUCTURED_COMPACTION_PROMPT: &str = "\
You are a context compaction assistant for a software engineering agent. \
Produce a structured state checkpoint from the conversation history below. \
Use EXACTLY the following Markdown sections — do not add or remove sections. \
Be information-dense: preserve file paths, function names, error messages, \
code snippets, test names, and technical decisions verbatim where they matter.

## Active Task
Describe in 1-3 sentences what the agent is currently working on.

## Key Decisions & Rationale
List every significant technical decision made and why (bullet points). \
Include file or component names.

## Files & Artifacts
List every file that was read, modified, or created, with a brief note on what was done.

## Constraints & Requirements
List every requirement, constraint, or user preference that must be preserved.

## Pending Items
List every unfinished subtask or open question.

## Session Narrative
Write a dense technical summary (2-5 paragraphs) of what happened, \
capturing the essential flow of events, tool outputs, and reasoning. \
Focus on facts the agent will need to continue correctly.";

// ─── Public API ───────────────────────────────────────────────────────────────

/// Default WARM zone size (spec §4.3: "next M messages, default 11-30") used
/// by the narrative-compatibility wrapper and by tests that don't thread a
/// configured `compaction_warm_size` through.
const DEFAULT_WARM_ZONE: usize = 20;

/// Target size of the COLD zone's key-facts digest, in tokens (spec §4.3).
const COLD_DIGEST_TARGET_TOKENS: usize = 512;

/// Replace the conversation history with a single summarisation request using
/// the legacy narrative strategy.  Kept for backward compatibility and direct
/// use in tests; prefer [`compact_session_with_strategy`] for new callers.
pub fn compact_session(messages: &mut Vec<Message>, system_msg: Option<Message>) -> usize {
    compact_session_with_strategy(
        messages,
        system_msg,
        &CompactionStrategy::Narrative,
        DEFAULT_WARM_ZONE,
    )
}

/// Zoned, strategy-aware compaction (spec §4.3): `messages` is everything
/// older than the HOT zone (the caller already keeps HOT verbatim).  The
/// tail `warm_size` messages are the WARM zone — stripped, merged, and
/// handed to the caller as a prompt for the model to summarise per-role on
/// the next turn.  Everything older than WARM is the COLD zone — stripped,
/// merged, and collapsed right here into a deterministic key-facts digest
/// (no model call), per steps (a)-(d).
///
/// An empty `messages` is a true no-op (testable property #5: `compact([]) =
/// []`) — nothing is inserted, not even `system_msg`, since there is nothing
/// to compact.
///
/// The caller is responsible for actually invoking the model on the returned
/// prompt and rebuilding the session from the resulting summary text. This
/// function only rewrites the `messages` list to contain the compaction
/// prompt (WARM text plus the COLD digest).
pub fn compact_session_with_strategy(
    messages: &mut Vec<Message>,
    system_msg: Option<Message>,
    strategy: &CompactionStrategy,
    warm_size: usize,
) -> usize {
    let before = messages.len();
    if messages.is_empty() {
        return before;
    }

    let warm_size = warm_size.min(messages.len());
    let split = messages.len() - warm_size;
    let cold = strip_tool_args_to_identifiers(&messages[..split]);
    let warm = strip_tool_args_to_identifiers(&messages[split..]);
    let cold = merge_consecutive_same_role(cold); // step (b)
    let warm = merge_consecutive_same_role(warm);

    // Step (d): COLD is compressed now, deterministically — no model call.
    let cold_digest = cold_key_facts_digest(&cold, COLD_DIGEST_TARGET_TOKENS);
    // Step (c): WARM is hand	ed to the caller's next model turn for a
    // per-role summary; this function only prepares the request text.
    let warm_text = serialize_history(&warm);

    let prompt = match strategy {
        CompactionStrategy::Structured => STRUCTURED_COMPACTION_PROMPT,
        CompactionStrategy::Narrative => SUMMARIZE_PROMPT,
    };
    let summary_request = if cold_digest.is_empty() {
        Message::user(format!("{prompt}\n\n---\n\n{warm_text}"))
    } else {
        Message::user(format!(
            "{prompt}\n\n--- Older context, already condensed to key facts ---\n\n\
             {cold_digest}\n\n--- Recent context to summarize ---\n\n{warm_text}"
        ))
    };

    messages.clear();
    if let Some(sys) = system_msg {
        messages.push(sys);
    }
    messages.push(summary_request);
    before
}

/// Emergency fallback compaction used when the session is too large to fit even
/// a compaction prompt within the context window, or when the emergency
/// usage tier has been reached (spec §4.3 step (e)).
///
/// The most recent `keep_n` non-system messages are always preserved
/// verbatim. The remainder is importance-ranked (tool calls/results, acks,
/// and the parent signal's weight all adjust retention — spec §4.3) and
/// roughly half of it — by weighted rank, not just recency — is kept, so
/// the total shrinks by about 50% rather than being dropped outright. No
/// model call is made — this is a purely deterministic operation that
/// always succeeds regardless of session size.
pub fn emergency_compact(
    messages: &mut Vec<Message>,
    system_msg: Option<Message>,
    keep_n: usize,
    parent_signal_weight: Option<f32>,
) -> usize {
    let before = messages.len();
    let non_system: Vec<Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect();
    let notice = Message::assistant(
        "[Context emergency-compacted: earlier history was dropped to prevent a \
         context-window overflow. The agent may lack full context for earlier \
         decisions. Proceed carefully and ask the user to re-provide any missing \
         requirements if needed.]",
    );

    if non_system.is_empty() {
        messages.clear();
        if let Some(sys) = system_msg {
            messages.push(sys);
        }
        return before;
    }

    let keep = keep_n.min(non_system.len());
    let (older, recent) = non_system.split_at(non_system.len() - keep);
    let preserved_older = retain_by_importance(older, parent_signal_weight);

    messages.clear();
    if let Some(sys) = system_msg {
        messages.push(sys);
    }
    messages.push(notice);
    messages.extend(preserved_older);
    messages.extend(recent.to_vec());
    before
}

/// Rank `older` by [`importance_weight`] and keep roughly the top half,
/// grouped so a tool call and its tool result are always kept or dropped
/// together — dropping one but not the other would leave a dangling
/// tool-result reference in the compacted history.
fn retain_by_importance(older: &[Message], parent_signal_weight: Option<f32>) -> Vec<Message> {
    if older.is_empty() {
        return Vec::new();
    }
    let units = group_tool_units(older);
    let mut ranked: Vec<(usize, f32)> = units
        .iter()
        .enumerate()
        .map(|(unit_idx, idxs)| {
            let weight = idxs
                .iter()
                .map(|&i| importance_weight(&older[i], parent_signal_weight))
                .fold(0.0_f32, f32::max);
            (unit_idx, weight)
        })
        .collect();
    // Stable sort: highest weight first; ties preserve original (oldest-first)
    // order so recency still breaks ties among equally-important messages.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let keep_units = units.len() / 2;
    let mut keep_idx: Vec<usize> = ranked.into_iter().take(keep_units).map(|(i, _)| i).collect();
    keep_idx.sort_unstable();

    keep_idx
        .into_iter()
        .flat_map(|unit_idx| units[unit_idx].iter().map(|&i| older[i].clone()))
        .collect()
}

/// Group messages into retention units: a `ToolCall` and its matching
/// `ToolResult` form one unit; everything else is its own unit of size one.
fn group_tool_units(messages: &[Message]) -> Vec<Vec<usize>> {
    let mut units: Vec<Vec<usize>> = Vec::new();
    let mut call_unit: HashMap<String, usize> = HashMap::new();
    for (i, m) in messages.iter().enumerate() {
        match &m.content {
            MessageContent::ToolCall { tool_call_id, .. } => {
                units.push(vec![i]);
                call_unit.insert(tool_call_id.clone(), units.len() - 1);
            }
            MessageContent::ToolResult { tool_call_id, .. } => {
                if let Some(&idx) = call_unit.get(tool_call_id) {
                    units[idx].push(i);
                } else {
                    units.push(vec![i]);
                }
            }
            _ => units.push(vec![i]),
        }
    }
    units
}

/// Importance weighting used to rank messages for emergency retention (spec
/// §4.3): tool calls +50%, tool results +30%, messages belonging to a turn
/// whose classified signal had `weight > 0.8` +30%, acknowledgements -50%.
fn importance_weight(msg: &Message, parent_signal_weight: Option<f32>) -> f32 {
    let mut weight = 1.0_f32;
    match &msg.content {
        MessageContent::ToolCall { .. } => weight *= 1.5,
        MessageContent::ToolResult { .. } => weight *= 1.3,
        _ => {}
    }
    if parent_signal_weight.is_some_and(|w| w > 0.8) {
        weight *= 1.3;
    }
    if msg.as_text().is_some_and(is_acknowledgement) {
        weight *= 0.5;
    }
    weight
}

/// True if `text` is one of the noise filter's recognized acknowledgement
/// phrases (shared list, so compaction and noise filtering can't drift
/// apart — spec §4.3's "acknowledgements" and §4.6's `tier1` noise check
/// are the same notion of "ack").
fn is_acknowledgement(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    crate::noise::ACK_WORDS.contains(&lower.as_str())
}

/// Step (a): strip verbose tool-call arguments down to just the call id, so a
/// compacted WARM/COLD zone doesn't carry full argument payloads (file
/// contents, long shell commands) that add little value once summarised.
/// Tool *results* are left untouched — only tool-call arguments are "verbose"
/// per spec §4.3.
fn strip_tool_args_to_identifiers(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| match &m.content {
            MessageContent::ToolCall { tool_call_id, function } => Message {
                role: m.role.clone(),
                content: MessageContent::ToolCall {
                    tool_call_id: tool_call_id.clone(),
                    function: FunctionCall {
                        name: function.name.clone(),
                        arguments: format!("{{\"call_id\":\"{tool_call_id}\"}}"),
                    },
                },
            },
            _ => m.clone(),
        })
        .collect()
}

/// Step (b): merge consecutive plain-text messages from the same role into
/// one. Tool-call/tool-result messages are never merged — they carry
/// per-call ids that must stay addressable.
fn merge_consecutive_same_role(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    for m in messages {
        let can_merge = matches!(m.content, MessageContent::Text(_));
        if can_merge {
            if let Some(last) = out.last_mut() {
                if last.role == m.role {
                    if let (MessageContent::Text(lt), MessageContent::Text(mt)) =
                        (&mut last.content, &m.content)
                    {
                        lt.push('\n');
                        lt.push_str(mt);
                        continue;
                    }
                }
            }
        }
        out.push(m);
    }
    out
}

/// Step (d): collapse the COLD zone into a deterministic key-facts digest —
/// one bullet per message, first line only, tool results omitted as too
/// verbose for a digest — capped to approximately `cap_tokens`.
fn cold_key_facts_digest(messages: &[Message], cap_tokens: usize) -> String {
    let bullets: Vec<String> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .filter_map(|m| {
            let role = role_label(m.role.clone());
            let text = match &m.content {
                MessageContent::Text(t) => Some(t.clone()),
                MessageContent::ToolCall { function, .. } => {
                    Some(format!("called {}", function.name))
                }
                MessageContent::ContentParts(parts) => Some(
                    parts
                        .iter()
                        .map(|p| match p {
                            osa_model::ContentPart::Text { text } => text.clone(),
                            osa_model::ContentPart::Image { .. } => "[image]".to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(" "),
                ),
                MessageContent::ToolResult { .. } => None,
            }?;
            let first_line = text.lines().next().unwrap_or("").trim();
            if first_line.is_empty() {
                return None;
            }
            Some(format!("- {role}: {first_line}"))
        })
        .collect();
    if bullets.is_empty() {
        return String::new();
    }
    let joined = bullets.join("\n");
    smart_truncate(&joined, OutputCategory::Generic, cap_tokens)
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Tool => "Tool",
        Role::System => "System",
    }
}

/// Deterministic, content-aware tool-result truncation.
///
/// Returns `content` unchanged when it fits within `cap_tokens`.
/// Otherwise applies a category-specific extraction strategy that preserves
/// the most useful portion of the output.  Dispatching on [`OutputCategory`]
/// (not on tool names) keeps this function independent of the tools crate's
/// concrete tool list; each tool declares its own category.
///
/// - [`OutputCategory::HeadTail`]: keep the first 60 + last 40 lines so both
///   the command preamble and the final result are visible.
/// - [`OutputCategory::MatchList`]: keep leading matches (highest relevance
///   first); the tail is not preserved because later matches are less relevant.
/// - [`OutputCategory::FileContent`]: balanced head + tail with a separator,
///   preserving both the imports/declarations and the most recent changes.
/// - [`OutputCategory::Generic`]: hard-truncate at the nearest line boundary.
///
/// Every truncated result ends with an explicit notice so the model knows
/// that additional content exists and how to retrieve it.
pub fn smart_truncate(content: &str, category: OutputCategory, cap_tokens: usize) -> String {
    if cap_tokens == 0 {
        return content.to_string();
    }
    let cap_chars = cap_tokens * 4;
    if content.len() <= cap_chars {
        return content.to_string();
    }
    let omitted_bytes = content.len().saturating_sub(cap_chars);
    match category {
        OutputCategory::HeadTail => head_tail_lines(
            content,
            cap_chars,
            60,
            40,
            &format!("[... {{lines}} lines / {omitted_bytes} bytes omitted ...]"),
        ),
        OutputCategory::MatchList => head_lines(
            content,
            cap_chars,
            &format!(
                "[... {{lines}} more matches omitted ({omitted_bytes} bytes); \
                     use a more specific pattern to see them ...]"
            ),
        ),
        OutputCategory::FileContent => head_tail_lines(
            content,
            cap_chars,
            usize::MAX,
            usize::MAX,
            &format!(
                "[... {{lines}} lines omitted ({omitted_bytes} bytes); \
                     use read_file with offset/limit to see more ...]"
            ),
        ),
        OutputCategory::Generic => {
            let cut = content[..cap_chars]
                .rfind('\n')
                .map(|p| p + 1)
                .unwrap_or(cap_chars);
            format!(
                "{}\n[... {omitted_bytes} bytes omitted; \
                 content truncated to fit context budget ...]",
                &content[..cut]
            )
        }
    }
}

// ─── Private helpers ──────────────────────────────────────────────────────────

/// Serialise a message list into plain text for inclusion in a compaction prompt.
fn serialize_history(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !matches!(m.role, Role::System))
        .map(|m| {
            let role = match m.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Tool => "Tool",
                Role::System => "System",
            };
            let text = match &m.content {
                osa_model::MessageContent::Text(t) => t.clone(),
                osa_model::MessageContent::ContentParts(parts) => parts
                    .iter()
                    .map(|p| match p {
                        osa_model::ContentPart::Text { text } => text.clone(),
                        osa_model::ContentPart::Image { .. } => "[image]".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                osa_model::MessageContent::ToolCall { function, .. } => {
                    format!("[tool_call: {}({})]", function.name, function.arguments)
                }
                osa_model::MessageContent::ToolResult { content, .. } => {
                    format!("[tool_result: {content}]")
                }
            };
            format!("{role}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Keep only the leading lines that fit within `cap_chars`.
fn head_lines(content: &str, cap_chars: usize, notice_template: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut kept = String::with_capacity(cap_chars);
    let mut kept_count = 0usize;
    for line in &lines {
        let needed = if kept.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if kept.len() + needed > cap_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_count += 1;
    }
    let omitted = lines.len().saturating_sub(kept_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{kept}\n{notice}")
}

/// Keep `max_head` leading lines and `max_tail` trailing lines, inserting a
/// notice between them.  Pass `usize::MAX` to split evenly by character budget.
fn head_tail_lines(
    content: &str,
    cap_chars: usize,
    max_head: usize,
    max_tail: usize,
    notice_template: &str,
) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let half_cap = cap_chars / 2;

    // Head
    let mut head = String::with_capacity(half_cap);
    let mut head_count = 0usize;
    for line in lines.iter().take(max_head) {
        let needed = if head.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if head.len() + needed > half_cap {
            break;
        }
        if !head.is_empty() {
            head.push('\n');
        }
        head.push_str(line);
        head_count += 1;
    }

    // Tail (collect from the end)
    let mut tail_lines: Vec<&str> = Vec::new();
    let mut tail_chars = 0usize;
    for line in lines.iter().rev().take(max_tail) {
        let needed = if tail_lines.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };
        if tail_chars + needed > half_cap {
            break;
        }
        tail_chars += needed;
        tail_lines.push(line);
    }
    tail_lines.reverse();
    let tail_count = tail_lines.len();
    let tail = tail_lines.join("\n");

    let omitted = lines.len().saturating_sub(head_count + tail_count);
    if omitted == 0 {
        return content[..cap_chars.min(content.len())].to_string();
    }
    let notice = notice_template.replace("{lines}", &omitted.to_string());
    format!("{head}\n{notice}\n{tail}")
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use osa_model::{FunctionCall, Message, MessageContent, Role};

    fn make_history() -> Vec<Message> {
        vec![
            Message::system("You are a helpful assistant."),
            Message::user("What is Rust?"),
            Message::assistant("Rust is a systems programming language."),
            Message::user("Show me an example."),
            Message::assistant("fn main() { println!(\"Hello\"); }"),
        ]
    }

    // ── compact_session (legacy narrative) ────────────────────────────────────

    #[test]
    fn returns_original_message_count() {
        let mut msgs = make_history();
        let before = compact_session(&mut msgs, None);
        assert_eq!(before, 5);
    }

    #[test]
    fn output_has_single_user_summary_request_without_system() {
        let mut msgs = make_history();
        compact_session(&mut msgs, None);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
    }

    #[test]
    fn output_with_system_message_has_two_messages() {
        let mut msgs = make_history();
        let sys = Message::system("Keep this system message.");
        compact_session(&mut msgs, Some(sys));
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].role, Role::User);
    }

    #[test]
    fn system_message_content_is_preserved() {
        let mut msgs = make_history();
        let sys = Message::system("Custom system prompt.");
        compact_session(&mut msgs, Some(sys));
        assert_eq!(msgs[0].as_text(), Some("Custom system prompt."));
    }

    #[test]
    fn summary_request_contains_original_text() {
        let mut msgs = make_history();
        compact_session(&mut msgs, None);
        let summary_text = msgs[0].as_text().unwrap();
        assert!(summary_text.contains("What is Rust?"));
        assert!(summary_text.contains("systems programming language"));
    }

    #[test]
    fn system_messages_excluded_from_history_text() {
        let mut msgs = make_history();
        compact_session(&mut msgs, None);
        let summary_text = msgs[0].as_text().unwrap();
        assert!(!summary_text.contains("You are a helpful assistant"));
    }

    #[test]
    fn tool_call_serialised_in_history_with_args_stripped() {
        // Step (a): verbose tool-call arguments are stripped to an identifier
        // before the WARM zone is serialized into the compaction prompt.
        let mut msgs = vec![
            Message::user("run ls"),
            Message {
                role: Role::Assistant,
                content: MessageContent::ToolCall {
                    tool_call_id: "id1".into(),
                    function: FunctionCall {
                        name: "shell".into(),
                        arguments: r#"{"command":"ls"}"#.into(),
                    },
                },
            },
        ];
        compact_session(&mut msgs, None);
        let text = msgs[0].as_text().unwrap();
        assert!(text.contains("shell"), "tool name should appear in history");
        assert!(text.contains("id1"), "call id should appear in history");
        assert!(
            !text.contains("\"command\":\"ls\""),
            "verbose tool-call arguments must be stripped per step (a)"
        );
    }

    #[test]
    fn tool_result_serialised_in_history() {
        let mut msgs = vec![
            Message::user("run ls"),
            Message::tool_result("id1", "file1.txt\nfile2.txt"),
        ];
        compact_session(&mut msgs, None);
        let text = msgs[0].as_text().unwrap();
        assert!(text.contains("file1.txt"));
    }

    #[test]
    fn compact_empty_history_returns_zero() {
        let mut msgs: Vec<Message> = vec![];
        let count = compact_session(&mut msgs, None);
        assert_eq!(count, 0);
    }

    #[test]
    fn compact_empty_history_is_a_true_noop() {
        // Testable property #5: compact([]) = []. Not even a summary-request
        // message is inserted when there is nothing to compact.
        let mut msgs: Vec<Message> = vec![];
        compact_session(&mut msgs, None);
        assert_eq!(msgs.len(), 0);
    }

    #[test]
    fn compact_empty_history_ignores_system_msg_too() {
        let mut msgs: Vec<Message> = vec![];
        compact_session(&mut msgs, Some(Message::system("sys")));
        assert!(msgs.is_empty(), "a true no-op inserts nothing, not even system_msg");
    }

    // ── compact_session_with_strategy (structured) ────────────────────────────

    #[test]
    fn structured_compaction_prompt_contains_required_sections() {
        let mut msgs = make_history();
        compact_session_with_strategy(
            &mut msgs,
            None,
            &CompactionStrategy::Structured,
            DEFAULT_WARM_ZONE,
        );
        let text = msgs[0].as_text().unwrap();
        assert!(
            text.contains("## Active Task"),
            "missing Active Task section"
        );
        assert!(
            text.contains("## Key Decisions"),
            "missing Key Decisions section"
        );
        assert!(
            text.contains("## Files & Artifacts"),
            "missing Files section"
        );
        assert!(
            text.contains("## Constraints"),
            "missing Constraints section"
        );
        assert!(
            text.contains("## Pending Items"),
            "missing Pending Items section"
        );
        assert!(
            text.contains("## Session Narrative"),
            "missing Narrative section"
        );
    }

    #[test]
    fn structured_compaction_includes_history() {
        let mut msgs = make_history();
        compact_session_with_strategy(
            &mut msgs,
            None,
            &CompactionStrategy::Structured,
            DEFAULT_WARM_ZONE,
        );
        let text = msgs[0].as_text().unwrap();
        assert!(
            text.contains("What is Rust?"),
            "history must be embedded in prompt"
        );
    }

    // ── emergency_compact ─────────────────────────────────────────────────────

    #[test]
    fn emergency_compact_returns_original_count() {
        let mut msgs = make_history();
        let before = emergency_compact(&mut msgs, None, 2, None);
        assert_eq!(before, 5);
    }

    #[test]
    fn emergency_compact_preserves_recent_tail_and_trims_older_by_half() {
        let mut msgs = make_history();
        // 4 non-system messages; keep 2 recent verbatim, importance-rank the rest.
        emergency_compact(&mut msgs, None, 2, None);
        // notice + at least the 2 recent + up to half of the older units.
        let non_sys: Vec<_> = msgs.iter().filter(|m| m.role != Role::System).collect();
        assert!(
            non_sys.len() >= 3 && non_sys.len() <= 4,
            "expected notice + 2 recent + up to half the older messages, got {}",
            non_sys.len()
        );
    }

    #[test]
    fn emergency_compact_preserves_most_recent_messages() {
        let mut msgs = vec![
            Message::user("old message"),
            Message::assistant("old reply"),
            Message::user("recent message"),
            Message::assistant("recent reply"),
        ];
        emergency_compact(&mut msgs, None, 2, None);
        let text: Vec<String> = msgs
            .iter()
            .filter_map(|m| m.as_text().map(|t| t.to_string()))
            .collect();
        assert!(
            text.iter().any(|t| t.contains("recent message")),
            "most recent user message must be preserved"
        );
        assert!(
            text.iter().any(|t| t.contains("recent reply")),
            "most recent assistant reply must be preserved"
        );
    }

    #[test]
    fn emergency_compact_with_system_message_puts_sys_first() {
        let mut msgs = make_history();
        let sys = Message::system("system content");
        emergency_compact(&mut msgs, Some(sys), 2, None);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[0].as_text(), Some("system content"));
    }

    #[test]
    fn emergency_compact_notice_contains_warning_text() {
        let mut msgs = make_history();
        emergency_compact(&mut msgs, None, 2, None);
        let notice_text = msgs[0].as_text().unwrap();
        assert!(
            notice_text.contains("emergency-compacted"),
            "notice must mention emergency compaction"
        );
    }

    // ── smart_truncate ────────────────────────────────────────────────────────

    /// Build a multi-line string of exactly `n` lines, each of the form "line N".
    fn make_lines(n: usize) -> String {
        (0..n)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // -- pass-through (no truncation) --

    #[test]
    fn smart_truncate_returns_original_when_under_cap() {
        let short = "hello world";
        assert_eq!(smart_truncate(short, OutputCategory::HeadTail, 100), short);
    }

    #[test]
    fn smart_truncate_zero_cap_returns_original() {
        let content = "a".repeat(10_000);
        assert_eq!(
            smart_truncate(&content, OutputCategory::HeadTail, 0),
            content
        );
    }

    #[test]
    fn smart_truncate_empty_content_returns_empty() {
        assert_eq!(smart_truncate("", OutputCategory::Generic, 10), "");
    }

    #[test]
    fn smart_truncate_exactly_at_cap_not_truncated() {
        // cap_chars = 10 * 4 = 40 bytes; content is exactly 40 bytes
        let content = "a".repeat(40);
        let result = smart_truncate(&content, OutputCategory::Generic, 10);
        assert_eq!(
            result, content,
            "content at exact cap boundary must not be truncated"
        );
    }

    #[test]
    fn smart_truncate_one_byte_over_cap_is_truncated() {
        // cap_chars = 10 * 4 = 40 bytes; content is 41 bytes
        let content = "a".repeat(41);
        let result = smart_truncate(&content, OutputCategory::Generic, 10);
        assert_ne!(
            result, content,
            "content one byte over cap must be truncated"
        );
        assert!(result.contains("omitted"));
    }

    // -- all categories add an omission notice --

    #[test]
    fn all_categories_add_omission_notice_when_truncated() {
        let content = make_lines(1000);
        for category in [
            OutputCategory::HeadTail,
            OutputCategory::MatchList,
            OutputCategory::FileContent,
            OutputCategory::Generic,
        ] {
            let result = smart_truncate(&content, category, 10);
            assert!(
                result.contains("omitted"),
                "{category:?} truncation must include an omission notice"
            );
        }
    }

    // -- HeadTail: keeps first and last lines --

    #[test]
    fn headtail_preserves_first_lines() {
        // 200 lines; cap 50 tokens (200 chars). HeadTail keeps lines 0-59 + last 40.
        let content = make_lines(200);
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(
            result.contains("line 0"),
            "HeadTail must preserve the first line"
        );
        assert!(
            result.contains("line 1"),
            "HeadTail must preserve early lines"
        );
    }

    #[test]
    fn headtail_preserves_last_lines() {
        let content = make_lines(200);
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(
            result.contains("line 199"),
            "HeadTail must preserve the last line"
        );
        assert!(
            result.contains("line 198"),
            "HeadTail must preserve recent lines"
        );
    }

    #[test]
    fn headtail_drops_middle_lines() {
        // With 200 lines and a tight cap, middle lines (e.g. line 100) must be gone.
        let content = make_lines(200);
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        // line 100 is in the middle — neither in the first 60 nor the last 40
        assert!(
            !result.contains("line 100\n") && !result.contains("\nline 100"),
            "HeadTail must drop middle lines that exceed the cap"
        );
    }

    // -- MatchList: keeps only leading content --

    #[test]
    fn matchlist_keeps_leading_matches() {
        let content = (0..500)
            .map(|i| format!("match {i}: some content"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::MatchList, 50);
        assert!(
            result.contains("match 0:"),
            "MatchList must keep the first match"
        );
    }

    #[test]
    fn matchlist_does_not_preserve_trailing_content() {
        // 500 matches; with a small cap the last match must be gone.
        let content = (0..500)
            .map(|i| format!("match {i}: some content"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::MatchList, 50);
        assert!(
            !result.contains("match 499:"),
            "MatchList must NOT jump to the tail — that distinguishes it from HeadTail"
        );
    }

    // -- FileContent: symmetric head + tail --

    #[test]
    fn filecontent_preserves_first_and_last_lines() {
        let content = make_lines(1000);
        let result = smart_truncate(&content, OutputCategory::FileContent, 50);
        assert!(
            result.contains("line 0"),
            "FileContent must preserve the first line"
        );
        assert!(
            result.contains("line 999"),
            "FileContent must preserve the last line"
        );
    }

    #[test]
    fn filecontent_drops_middle_lines() {
        let content = make_lines(1000);
        let result = smart_truncate(&content, OutputCategory::FileContent, 50);
        // With 1000 lines and a 200-char cap there is no room for line 500
        assert!(
            !result.contains("line 500\n") && !result.contains("\nline 500"),
            "FileContent must drop middle content"
        );
    }

    // -- Generic: hard-truncates at nearest newline --

    #[test]
    fn generic_truncates_at_newline_boundary() {
        // Build a string where the newline is well within the cap window.
        // cap = 5 tokens → 20 chars; content has a newline at position 10.
        let content = format!("{}\n{}", "a".repeat(10), "b".repeat(100));
        let result = smart_truncate(&content, OutputCategory::Generic, 5);
        // The cut should happen at the newline (position 11), not mid-word.
        assert!(
            !result.contains("bbb"),
            "Generic must not include content past the nearest newline"
        );
    }

    #[test]
    fn generic_falls_back_to_hard_cut_when_no_newline() {
        // A single long line with no newlines — hard cut at cap_chars.
        let content = "x".repeat(10_000);
        let result = smart_truncate(&content, OutputCategory::Generic, 10);
        // cap_chars = 40; result must be ≤ 40 chars of 'x' plus the notice
        let x_count = result.chars().take_while(|&c| c == 'x').count();
        assert_eq!(
            x_count, 40,
            "Generic must hard-cut at cap_chars when no newline is found"
        );
    }

    // -- Omission notice content --

    #[test]
    fn headtail_omission_notice_mentions_lines_and_bytes() {
        let content = make_lines(200);
        let result = smart_truncate(&content, OutputCategory::HeadTail, 20);
        assert!(
            result.contains("omitted"),
            "HeadTail notice must mention 'omitted'"
        );
        assert!(
            result.contains("bytes"),
            "HeadTail notice must state byte count"
        );
    }

    #[test]
    fn matchlist_omission_notice_mentions_matches() {
        let content = (0..500)
            .map(|i| format!("match {i}: foo"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::MatchList, 20);
        assert!(
            result.contains("matches omitted"),
            "MatchList notice must mention 'matches omitted'"
        );
    }

    #[test]
    fn filecontent_omission_notice_suggests_offset_limit() {
        let content = make_lines(1000);
        let result = smart_truncate(&content, OutputCategory::FileContent, 20);
        assert!(
            result.contains("offset") || result.contains("limit"),
            "FileContent notice must suggest offset/limit to retrieve more"
        );
    }

    // -- legacy omission notice tests (kept for regression) --

    #[test]
    fn smart_truncate_shell_includes_omission_notice() {
        let content = make_lines(200);
        let result = smart_truncate(&content, OutputCategory::HeadTail, 50);
        assert!(
            result.contains("omitted"),
            "truncated HeadTail output must contain omission notice"
        );
    }

    #[test]
    fn smart_truncate_grep_includes_omission_notice() {
        let content = (0..500)
            .map(|i| format!("match {i}: some content here"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::MatchList, 100);
        assert!(
            result.contains("matches omitted") || result.contains("omitted"),
            "truncated MatchList output must note omission"
        );
    }

    #[test]
    fn smart_truncate_read_file_includes_omission_notice() {
        let content = (0..500)
            .map(|i| format!("{i}: some source code line here"))
            .collect::<Vec<_>>()
            .join("\n");
        let result = smart_truncate(&content, OutputCategory::FileContent, 100);
        assert!(
            result.contains("omitted"),
            "truncated FileContent output must contain omission notice"
        );
    }

    #[test]
    fn smart_truncate_respects_cap_approximately() {
        let content = "x".repeat(80_000); // 20000 tokens
        let result = smart_truncate(&content, OutputCategory::Generic, 100);
        // cap_chars = 400; result should be cap + notice, well under 1000
        assert!(
            result.len() < 1000,
            "truncated output should be close to cap size"
        );
    }
}
