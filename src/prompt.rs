//! User interaction behind a trait, so runs can be scripted or unattended.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};

pub trait Prompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Index of the chosen item
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;
}

/// Terminal prompts
pub struct Interactive;

impl Prompter for Interactive {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .context("Failed to read confirmation")
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()
            .context("Failed to read selection")
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input.interact_text().context("Failed to read input")
    }
}

/// Answers every prompt with its default
pub struct AutoAnswer;

impl Prompter for AutoAnswer {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        log::debug!("{prompt} -> {default} (non-interactive)");
        Ok(default)
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        log::debug!(
            "{prompt} -> {} (non-interactive)",
            items.get(default).map_or("<none>", String::as_str)
        );
        Ok(default)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        default
            .map(str::to_string)
            .with_context(|| format!("'{prompt}' needs an answer in non-interactive mode"))
    }
}
