// Copyright (c) 2024 Jan Holthuis <jan.holthuis@rub.de>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0. If a copy
// of the MPL was not distributed with this file, You can obtain one at
// http://mozilla.org/MPL/2.0/.
//
// SPDX-License-Identifier: MPL-2.0

//! The interactive prompt capability: presents an ambiguous/low-coverage/no-candidate decision
//! to the user and reads back their choice.
//!
//! The terminal rendering itself lives behind the [`Prompt`] trait so that the decision cascade
//! never depends on a concrete UI; [`InquirePrompt`] is the only implementation, backed by
//! `inquire`, the same crate the candidate-selection screen in this corpus is built on.

use std::fmt;

use crossterm::style::{Color, Stylize};
use inquire::{validator::Validation, InquireError, Select, Text};

/// One release candidate offered at a prompt.
#[derive(Debug, Clone)]
pub struct PromptOption {
    /// Release key, e.g. `"musicbrainz:<uuid>"`.
    pub release_key: String,
    /// Display label, e.g. `"Artist - Album (2011, 12 tracks)"`.
    pub label: String,
    /// Score used only to rank options, highest first.
    pub score: f64,
}

/// What the user chose at a release prompt.
#[derive(Debug, Clone)]
pub enum PromptOutcome {
    /// The user picked a listed candidate.
    Selected {
        /// The chosen release key.
        release_key: String,
    },
    /// The user entered a MusicBrainz or Discogs release ID by hand.
    Forced {
        /// `"musicbrainz"` or `"discogs"`.
        provider: String,
        /// The release ID as entered.
        release_id: String,
    },
    /// Skip this directory for now; it may be retried on a later run.
    Skip,
    /// Delete the directory outright (relocate capability, not performed here).
    Delete,
    /// Archive the directory (relocate capability, not performed here).
    Archive,
    /// Never prompt about this directory again.
    Ignore,
}

/// Abstraction over "present labeled options and read a choice", so the decision cascade can be
/// exercised in tests without a terminal.
pub trait Prompt {
    /// Present `options` for `directory_display` and block until the user responds.
    fn select_release(&self, directory_display: &str, options: &[PromptOption]) -> PromptOutcome;
}

/// Parse a manual `mb:<id>` / `musicbrainz:<id>` / `dg:<id>` / `discogs:<id>` entry.
#[must_use]
pub fn parse_manual_choice(input: &str) -> Option<(String, String)> {
    for prefix in ["mb:", "musicbrainz:"] {
        if let Some(id) = input.strip_prefix(prefix) {
            let id = id.trim();
            if !id.is_empty() {
                return Some(("musicbrainz".to_string(), id.to_string()));
            }
        }
    }
    for prefix in ["dg:", "discogs:"] {
        if let Some(id) = input.strip_prefix(prefix) {
            let id = id.trim();
            if !id.is_empty() {
                return Some(("discogs".to_string(), id.to_string()));
            }
        }
    }
    None
}

/// One entry in the `inquire::Select` menu: either a candidate or one of the fixed actions.
#[derive(Clone)]
enum MenuEntry<'a> {
    Candidate(&'a PromptOption),
    Skip,
    Delete,
    Archive,
    Ignore,
    EnterManualId,
}

impl fmt::Display for MenuEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuEntry::Candidate(option) => {
                let percent = option.score.clamp(0.0, 1.0) * 100.0;
                let color = if percent >= 90.0 {
                    Color::Green
                } else if percent >= 50.0 {
                    Color::Yellow
                } else {
                    Color::Red
                };
                write!(
                    f,
                    "{} {}",
                    option.label,
                    format!("({percent:.0}%)").with(color).bold()
                )
            }
            MenuEntry::Skip => write!(f, "{}", "Skip this directory".blue()),
            MenuEntry::Delete => write!(f, "{}", "Delete this directory".red()),
            MenuEntry::Archive => write!(f, "{}", "Archive this directory".blue()),
            MenuEntry::Ignore => write!(f, "{}", "Ignore this directory".blue()),
            MenuEntry::EnterManualId => write!(f, "{}", "Enter MusicBrainz/Discogs ID".blue()),
        }
    }
}

/// Terminal-backed [`Prompt`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompt;

impl Prompt for InquirePrompt {
    fn select_release(&self, directory_display: &str, options: &[PromptOption]) -> PromptOutcome {
        let mut sorted = options.to_vec();
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let menu: Vec<MenuEntry<'_>> = sorted
            .iter()
            .map(MenuEntry::Candidate)
            .chain([
                MenuEntry::EnterManualId,
                MenuEntry::Skip,
                MenuEntry::Delete,
                MenuEntry::Archive,
                MenuEntry::Ignore,
            ])
            .collect();

        let prompt = format!("Select a release for {directory_display}:");
        loop {
            let selection = Select::new(&prompt, menu.clone()).prompt();
            let entry = match selection {
                Ok(entry) => entry,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    return PromptOutcome::Skip
                }
                Err(_) => return PromptOutcome::Skip,
            };
            match entry {
                MenuEntry::Candidate(option) => {
                    return PromptOutcome::Selected {
                        release_key: option.release_key.clone(),
                    }
                }
                MenuEntry::Skip => return PromptOutcome::Skip,
                MenuEntry::Delete => return PromptOutcome::Delete,
                MenuEntry::Archive => return PromptOutcome::Archive,
                MenuEntry::Ignore => return PromptOutcome::Ignore,
                MenuEntry::EnterManualId => {
                    let text = Text::new("Enter mb:<id> or dg:<id>: ")
                        .with_validator(|input: &str| {
                            if parse_manual_choice(input).is_some() {
                                Ok(Validation::Valid)
                            } else {
                                Ok(Validation::Invalid(
                                    "Expected mb:<id> or dg:<id>.".into(),
                                ))
                            }
                        })
                        .prompt();
                    if let Ok(text) = text {
                        if let Some((provider, release_id)) = parse_manual_choice(&text) {
                            return PromptOutcome::Forced {
                                provider,
                                release_id,
                            };
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manual_choice_musicbrainz() {
        assert_eq!(
            parse_manual_choice("mb:1234"),
            Some(("musicbrainz".to_string(), "1234".to_string()))
        );
    }

    #[test]
    fn test_parse_manual_choice_discogs() {
        assert_eq!(
            parse_manual_choice("dg:5678"),
            Some(("discogs".to_string(), "5678".to_string()))
        );
    }

    #[test]
    fn test_parse_manual_choice_rejects_garbage() {
        assert_eq!(parse_manual_choice("nonsense"), None);
    }

    #[test]
    fn test_parse_manual_choice_rejects_empty_id() {
        assert_eq!(parse_manual_choice("mb:"), None);
    }
}
