//! Default prompts and `{{placeholder}}` rendering.
//!
//! Prompt wording is configurable (see the `system_prompt` fields of [`crate::config::Configuration`]);
//! these defaults only fix which placeholders each prompt understands.

use crate::registry::ToolSchema;

/// System prompt for single-agent ReAct runs.
pub const REACT_SYSTEM_PROMPT: &str = "\
You are a capable assistant that solves the user's task by calling tools.
Today is {{date}}.

Available tools:
{{tools}}

Files produced so far:
{{files}}

{{basePrompt}}

User task: {{query}}";

/// Next-step prompt for single-agent ReAct runs.
pub const REACT_NEXT_STEP_PROMPT: &str = "\
Based on the conversation so far, decide the next action for the task: {{query}}
Call tools when more information or work is needed. When the task is complete, answer directly without calling tools.";

/// System prompt for the planner.
pub const PLANNER_SYSTEM_PROMPT: &str = "\
You are a planning agent. Break the user's task into an ordered plan using the `planning` tool.
Write each step as \"Step N. Stage: description\". Independent steps that can run at the same time may be combined into one step joined by <sep>.
Today is {{date}}.

Available tools for executors:
{{tools}}

Files produced so far:
{{files}}

{{sopPrompt}}

User task: {{query}}";

/// Next-step prompt for the planner.
pub const PLANNER_NEXT_STEP_PROMPT: &str = "\
Review the progress of the plan for: {{query}}
Update step statuses with the `planning` tool. When every step is done, call `planning` with command `finish`.";

/// System prompt for plan executors.
pub const EXECUTOR_SYSTEM_PROMPT: &str = "\
You are an executor agent. Complete the task you are given using the available tools.
Today is {{date}}.

Available tools:
{{tools}}

Files produced so far:
{{files}}

{{basePrompt}}

Overall user request: {{query}}
Current task: {{task}}";

/// Next-step prompt for plan executors.
pub const EXECUTOR_NEXT_STEP_PROMPT: &str = "\
Continue with the current task: {{task}}
When it is complete, reply with a short result without calling tools.";

/// System prompt for run summarization.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You summarize the outcome of an agent run for the user request: {{query}}

Task history:
{{taskHistory}}

Available files:
{{fileNameDesc}}

Reply with the summary, then the separator $$$, then the names of the files the user should receive, separated by commas.";

/// Replace every `{{key}}` in `template` with its value.
///
/// Unknown placeholders are left untouched so later passes (for example
/// the per-step `{{files}}` substitution) can fill them.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}

/// Tool description block for the `{{tools}}` placeholder.
pub fn tools_prompt(schemas: &[ToolSchema]) -> String {
    schemas
        .iter()
        .map(|s| format!("{}\n", s.prompt_line()))
        .collect()
}
