// src/exec/mock.rs

//! Scripted command runner for tests
//!
//! Records every command it is asked to run and answers from a list of
//! rules instead of touching the host. A rule matches when the command's
//! program and leading arguments equal the rule's pattern; the most recently
//! added matching rule wins. Unmatched commands succeed with empty output.

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::Result;
use std::cell::RefCell;

struct Rule {
    pattern: Vec<String>,
    output: CommandOutput,
}

impl Rule {
    fn matches(&self, cmd: &CommandSpec) -> bool {
        let Some((program, args)) = self.pattern.split_first() else {
            return true;
        };
        program == &cmd.program
            && args.len() <= cmd.args.len()
            && args.iter().zip(&cmd.args).all(|(a, b)| a == b)
    }
}

/// A [`CommandRunner`] that never spawns processes
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `pattern` (program first) with `output`
    pub fn on(&self, pattern: &[&str], output: CommandOutput) -> &Self {
        self.rules.borrow_mut().push(Rule {
            pattern: pattern.iter().map(|s| s.to_string()).collect(),
            output,
        });
        self
    }

    /// Every command run so far, in order
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Every command run so far, rendered as strings
    pub fn call_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    /// Whether any recorded command starts with `pattern`
    pub fn was_called(&self, pattern: &[&str]) -> bool {
        let rule = Rule {
            pattern: pattern.iter().map(|s| s.to_string()).collect(),
            output: CommandOutput::default(),
        };
        self.calls.borrow().iter().any(|c| rule.matches(c))
    }

    /// Forget recorded calls, keeping rules
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(cmd.clone());
        let output = self
            .rules
            .borrow()
            .iter()
            .rev()
            .find(|rule| rule.matches(cmd))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}
