//! Interactive questions asked on the terminal.

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::{self, BufRead, Write};

/// Yes/no and pick-one questions
pub trait Prompt {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;

    /// Returns the index of the chosen item, or `None` if nothing was chosen
    fn select(&mut self, message: &str, choices: &[String]) -> Result<Option<usize>>;
}

/// Prompts on stdin/stdout
pub struct TerminalPrompt<R: BufRead = io::StdinLock<'static>> {
    input: R,
}

impl TerminalPrompt {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> TerminalPrompt<R> {
    fn read_answer(&mut self) -> Result<String> {
        io::stdout().flush().context("Failed to flush stdout")?;
        let mut answer = String::new();
        self.input
            .read_line(&mut answer)
            .context("Failed to read answer")?;
        Ok(answer.trim().to_string())
    }
}

impl<R: BufRead> Prompt for TerminalPrompt<R> {
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        print!("{} {} ", message.yellow(), format!("({hint})").dimmed());
        let answer = self.read_answer()?;
        Ok(parse_yes_no(&answer).unwrap_or(default))
    }

    fn select(&mut self, message: &str, choices: &[String]) -> Result<Option<usize>> {
        println!("{}", message.bold());
        for (i, choice) in choices.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, choice);
        }
        print!("{} ", "Number:".dimmed());
        let answer = self.read_answer()?;
        Ok(answer
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=choices.len()).contains(n))
            .map(|n| n - 1))
    }
}

fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Answers questions from a fixed script, for tests
#[cfg(test)]
pub struct ScriptedPrompt {
    pub answers: std::collections::VecDeque<bool>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str, _default: bool) -> Result<bool> {
        self.asked.push(message.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("unexpected question: {message}"))
    }

    fn select(&mut self, message: &str, _choices: &[String]) -> Result<Option<usize>> {
        self.asked.push(message.to_string());
        Ok(self.answers.pop_front().and_then(|yes| yes.then_some(0)))
    }
}
