//! End-to-end runs of the agent graph against a scripted LLM.
//!
//! Each test scripts the planner, edit-planner, and summary replies in call
//! order and checks the resulting history, files, and response.

use codeflow::core::tools::ToolName;
use codeflow::core::types::{HistoryTool, ToolResult};
use codeflow::io::config::AgentConfig;
use codeflow::run::{RunStop, run};
use codeflow::test_support::{ScriptedLlm, Workspace, yaml_reply};

fn finish(reason: &str) -> String {
    format!("```yaml\ntool: finish\nreason: {reason}\n```")
}

#[test]
fn empty_directory_listing_is_a_successful_action() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new([
        yaml_reply("list_dir", "Look at the project", "relative_workspace_path: ."),
        finish("The project is empty"),
        "The project directory is empty.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "What files exist?", ws.path()).expect("run");
    assert_eq!(outcome.stop, RunStop::Finished);
    assert_eq!(outcome.response, "The project directory is empty.");
    assert_eq!(outcome.history.len(), 1);
    assert_eq!(
        outcome.history[0].result,
        ToolResult::ListDir {
            success: true,
            tree_visualization: String::new(),
            error: None,
        }
    );

    let second_planner_prompt = &llm.prompts()[1];
    assert!(second_planner_prompt.contains("(Empty or inaccessible directory)"));
}

/// A failing tool is recorded and the planner carries on.
#[test]
fn missing_file_read_is_recorded_and_run_continues() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new([
        yaml_reply("read_file", "Inspect main", "target_file: main.py"),
        finish("main.py does not exist"),
        "main.py does not exist yet.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "Explain main.py", ws.path()).expect("run");
    assert_eq!(outcome.stop, RunStop::Finished);
    let entry = &outcome.history[0];
    assert_eq!(entry.tool, HistoryTool::Tool(ToolName::ReadFile));
    assert!(!entry.result.success());
    assert!(
        entry
            .result
            .error()
            .expect("error")
            .contains("File main.py does not exist")
    );
    assert!(llm.prompts()[1].contains("- Result: Failed"));
}

/// Two replacements in one plan land on the original line numbers.
#[test]
fn edit_applies_both_ranges_bottom_up() {
    let ws = Workspace::new();
    ws.write("notes.txt", "one\ntwo\nthree\nfour\nfive\n");
    let plan = "```yaml
reasoning: Replace the two lowercase words.
operations:
  - start_line: 2
    end_line: 2
    replacement: |
      TWO
      TWO-AND-A-HALF
    reason: expand line 2
  - start_line: 4
    end_line: 4
    replacement: |
      FOUR
    reason: uppercase line 4
```";
    let llm = ScriptedLlm::new([
        yaml_reply(
            "edit_file",
            "Apply the requested changes",
            "target_file: notes.txt\ninstructions: Uppercase lines 2 and 4\ncode_edit: |\n  TWO\n  TWO-AND-A-HALF\n  // ... existing code ...\n  FOUR",
        ),
        plan.to_string(),
        finish("Both edits are in"),
        "Updated notes.txt.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "Edit notes", ws.path()).expect("run");
    assert_eq!(outcome.stop, RunStop::Finished);
    assert_eq!(
        ws.read("notes.txt"),
        "one\nTWO\nTWO-AND-A-HALF\nthree\nFOUR\nfive\n"
    );

    let ToolResult::EditFile {
        success,
        operations,
        reasoning,
        ..
    } = &outcome.history[0].result
    else {
        panic!("expected edit result");
    };
    assert!(success);
    assert_eq!(*operations, 2);
    assert!(reasoning.contains("lines 4-4: uppercase line 4"), "{reasoning}");

    let prompts = llm.prompts();
    assert!(prompts[1].contains("### File: notes.txt (5 lines)"));
    assert!(prompts[2].contains("- Operations: 2"));
}

#[test]
fn grep_without_matches_succeeds() {
    let ws = Workspace::new();
    ws.write("src/app.py", "def main():\n    pass\n");
    let llm = ScriptedLlm::new([
        yaml_reply("grep_search", "Find logging", "query: logging\ninclude_pattern: \"*.py\""),
        finish("No logging found"),
        "There is no logging in the project.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "Where is logging?", ws.path()).expect("run");
    assert_eq!(
        outcome.history[0].result,
        ToolResult::GrepSearch {
            success: true,
            matches: Vec::new(),
            error: None,
        }
    );
    assert!(llm.prompts()[1].contains("- Matches: 0"));
}

#[test]
fn delete_removes_the_file() {
    let ws = Workspace::new();
    ws.write("old.log", "stale\n");
    let llm = ScriptedLlm::new([
        yaml_reply("delete_file", "Remove the stale log", "target_file: old.log"),
        finish("Deleted"),
        "Removed old.log.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "Clean up", ws.path()).expect("run");
    assert!(outcome.history[0].result.success());
    assert!(!ws.path().join("old.log").exists());
}

/// A malformed reply is retried once and shows up in the history.
#[test]
fn malformed_planner_reply_is_retried() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new([
        "I think we should list the directory.".to_string(),
        yaml_reply("list_dir", "Retry with YAML", "relative_workspace_path: ."),
        finish("Done"),
        "Listed the project.".to_string(),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "List", ws.path()).expect("run");
    assert_eq!(outcome.stop, RunStop::Finished);
    assert_eq!(outcome.history.len(), 2);
    assert_eq!(outcome.history[0].tool, HistoryTool::RejectedDecision);
    assert_eq!(outcome.history[1].tool, HistoryTool::Tool(ToolName::ListDir));
}

#[test]
fn repeated_invalid_selections_end_the_run() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new([
        "```yaml\ntool: run_shell\nreason: x\nparams: {}\n```",
        "```yaml\ntool: run_shell\nreason: x\nparams: {}\n```",
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "Do it", ws.path()).expect("run");
    let RunStop::Failed { reason } = &outcome.stop else {
        panic!("expected failure");
    };
    assert!(reason.contains("rejected 2 times"), "{reason}");
    assert_eq!(outcome.history.len(), 2);
    assert!(outcome.response.contains("What was attempted:"));
    assert!(outcome.response.contains("- Tool: invalid_decision"));
}

#[test]
fn step_budget_bounds_a_looping_planner() {
    let ws = Workspace::new();
    let replies = (0..20).map(|_| yaml_reply("list_dir", "again", "relative_workspace_path: ."));
    let llm = ScriptedLlm::new(replies);
    let config = AgentConfig {
        max_steps: 6,
        ..AgentConfig::default()
    };

    let outcome = run(&llm, &config, "Keep looking", ws.path()).expect("run");
    assert_eq!(
        outcome.stop,
        RunStop::Failed {
            reason: "step budget exceeded (6 steps)".to_string()
        }
    );
    assert_eq!(outcome.history.len(), 3);
    assert_eq!(llm.prompts().len(), 3, "no summary call after a failure");
}

#[test]
fn llm_transport_failure_is_fatal_but_reported() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::from_results([
        Ok(yaml_reply("list_dir", "Look", "relative_workspace_path: .")),
        Err("connection reset".to_string()),
    ]);

    let outcome = run(&llm, &AgentConfig::default(), "List", ws.path()).expect("run");
    let RunStop::Failed { reason } = &outcome.stop else {
        panic!("expected failure");
    };
    assert!(reason.contains("connection reset"), "{reason}");
    assert_eq!(outcome.history.len(), 1);
    assert!(outcome.response.contains("Action 1:"));
}

#[test]
fn history_serializes_with_tool_names() {
    let ws = Workspace::new();
    let llm = ScriptedLlm::new([
        yaml_reply("list_dir", "Look", "relative_workspace_path: ."),
        finish("Done"),
        "ok".to_string(),
    ]);
    let outcome = run(&llm, &AgentConfig::default(), "List", ws.path()).expect("run");

    let json = serde_json::to_value(&outcome.history).expect("json");
    assert_eq!(json[0]["tool"], "list_dir");
    assert_eq!(json[0]["reason"], "Look");
    assert_eq!(json[0]["params"]["relative_workspace_path"], ".");
    assert_eq!(json[0]["result"]["success"], true);
}
