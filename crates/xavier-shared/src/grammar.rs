//! Command grammar - maps spoken transcripts to browser commands.
//!
//! Rules are tried in declaration order and the first match wins. Exact
//! phrases sit ahead of the broader hint-click pattern, and `focus_address`
//! comes after it; keep that order when adding rules.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::message::{Command, CommandArgs, CommandName, HINT_ARG};

/// Normalize a transcript for matching: lowercase, drop punctuation,
/// collapse whitespace, trim.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Builds args from a pattern rule's single capture group.
type ArgProducer = fn(&str) -> CommandArgs;

/// How a rule recognizes a normalized utterance.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Any of these phrases, compared verbatim.
    Exact(&'static [&'static str]),
    /// A regex with one capture group, post-processed into args.
    Pattern { regex: Regex, produce: ArgProducer },
}

#[derive(Debug, Clone)]
pub struct GrammarRule {
    pub name: CommandName,
    pub matcher: Matcher,
}

impl GrammarRule {
    pub fn exact(name: CommandName, phrases: &'static [&'static str]) -> Self {
        Self {
            name,
            matcher: Matcher::Exact(phrases),
        }
    }

    pub fn pattern(name: CommandName, regex: Regex, produce: ArgProducer) -> Self {
        Self {
            name,
            matcher: Matcher::Pattern { regex, produce },
        }
    }

    /// Args on a match, `None` otherwise.
    pub fn apply(&self, normalized: &str) -> Option<CommandArgs> {
        match &self.matcher {
            Matcher::Exact(phrases) => phrases
                .iter()
                .any(|phrase| *phrase == normalized)
                .then(CommandArgs::new),
            Matcher::Pattern { regex, produce } => regex
                .captures(normalized)
                .and_then(|caps| caps.get(1))
                .map(|group| produce(group.as_str())),
        }
    }
}

/// "click" followed by spoken letters only.
static HINT_CLICK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^click\s+([a-z\s]+)$").unwrap());

/// "a f" -> {hint: "AF"}
fn hint_args(letters: &str) -> CommandArgs {
    let code: String = letters
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    CommandArgs::from([(HINT_ARG.to_string(), code)])
}

/// Ordered rule table.
#[derive(Debug, Clone)]
pub struct CommandGrammar {
    rules: Vec<GrammarRule>,
}

impl CommandGrammar {
    pub fn new(rules: Vec<GrammarRule>) -> Self {
        Self { rules }
    }

    /// The browser command set.
    pub fn standard() -> Self {
        use CommandName::*;

        Self::new(vec![
            // Navigation
            GrammarRule::exact(Back, &["back", "go back"]),
            GrammarRule::exact(Forward, &["forward", "go forward"]),
            GrammarRule::exact(Reload, &["reload", "refresh"]),
            // Scrolling
            GrammarRule::exact(ScrollUp, &["scroll up", "up"]),
            GrammarRule::exact(ScrollDown, &["scroll down", "down"]),
            GrammarRule::exact(PageUp, &["page up"]),
            GrammarRule::exact(PageDown, &["page down"]),
            GrammarRule::exact(JumpTop, &["jump top", "top"]),
            GrammarRule::exact(JumpBottom, &["jump bottom", "bottom"]),
            // Tabs
            GrammarRule::exact(NewTab, &["new tab", "open tab"]),
            GrammarRule::exact(CloseTab, &["close tab"]),
            GrammarRule::exact(NextTab, &["next tab"]),
            GrammarRule::exact(PreviousTab, &["previous tab", "prev tab"]),
            // Hints
            GrammarRule::exact(ShowHints, &["show hints", "hints"]),
            GrammarRule::exact(HideHints, &["hide hints"]),
            GrammarRule::pattern(HintClick, HINT_CLICK.clone(), hint_args),
            // Address bar
            GrammarRule::exact(FocusAddress, &["focus address", "address bar"]),
        ])
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    /// Pure matching step over an already-normalized utterance.
    pub fn match_normalized(&self, normalized: &str) -> Option<(CommandName, CommandArgs)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(normalized).map(|args| (rule.name, args)))
    }

    /// Parse a raw transcript. `None` means the utterance is not a command,
    /// which is a normal outcome rather than an error.
    pub fn parse(&self, text: &str, confidence: f64) -> Option<Command> {
        let normalized = normalize(text);
        match self.match_normalized(&normalized) {
            Some((name, args)) => {
                debug!("Matched {:?} -> {}", normalized, name);
                Some(Command::new(name, args, confidence, text))
            }
            None => {
                warn!("No command matched for transcript: {}", text);
                None
            }
        }
    }
}

impl Default for CommandGrammar {
    fn default() -> Self {
        Self::standard()
    }
}

static STANDARD_GRAMMAR: LazyLock<CommandGrammar> = LazyLock::new(CommandGrammar::standard);

/// Parse with the standard grammar.
pub fn parse_command(text: &str, confidence: f64) -> Option<Command> {
    STANDARD_GRAMMAR.parse(text, confidence)
}
