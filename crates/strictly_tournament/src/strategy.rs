//! Pluggable capabilities: choosing a move and answering a question.

use crate::error::StrategyError;
use crate::types::{Move, RoundNumber, RoundResult, SubmissionRecord};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use strum::{Display, EnumString};
use tracing::{debug, info, instrument};

/// What a strategy may look at when choosing a move.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct MoveContext {
    /// Round being played.
    pub round_number: RoundNumber,
    /// The round's question.
    pub question: Option<String>,
    /// Answer already produced for the question.
    pub answer: String,
    /// Results revealed so far, ordered by round.
    pub history: Vec<RoundResult>,
    /// Earlier submissions, ordered by round.
    pub submissions: Vec<SubmissionRecord>,
}

/// Chooses a Rock-Paper-Scissors move for a round.
#[async_trait::async_trait]
pub trait MoveStrategy: Send + Sync {
    /// Short name for logs and status views.
    fn name(&self) -> &str;

    /// Picks a move. An error means no usable move; callers substitute a
    /// safe default.
    async fn choose(&self, context: &MoveContext) -> Result<Move, StrategyError>;
}

/// Produces the answer text for a round's question.
#[async_trait::async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Short name for logs and status views.
    fn name(&self) -> &str;

    /// Answers a question.
    async fn answer(&self, question: &str) -> Result<String, StrategyError>;
}

/// Built-in non-interactive strategies, selectable by name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    EnumString,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StrategyKind {
    /// Uniformly random move.
    #[default]
    Random,
    /// Always rock.
    Rock,
    /// Always paper.
    Paper,
    /// Always scissors.
    Scissors,
    /// Rock, paper, scissors in turn by round number.
    Cycle,
}

impl StrategyKind {
    /// Builds the strategy.
    #[instrument]
    pub fn build(self) -> Box<dyn MoveStrategy> {
        match self {
            Self::Random => Box::new(RandomStrategy::new()),
            Self::Rock => Box::new(FixedStrategy::new(Move::Rock)),
            Self::Paper => Box::new(FixedStrategy::new(Move::Paper)),
            Self::Scissors => Box::new(FixedStrategy::new(Move::Scissors)),
            Self::Cycle => Box::new(CycleStrategy),
        }
    }
}

/// Picks uniformly at random.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: Mutex<SmallRng>,
}

impl RandomStrategy {
    /// Seeds from the operating system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_os_rng()),
        }
    }

    /// Deterministic sequence for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MoveStrategy for RandomStrategy {
    fn name(&self) -> &str {
        "random"
    }

    async fn choose(&self, context: &MoveContext) -> Result<Move, StrategyError> {
        let code = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| StrategyError::new("random strategy lock poisoned"))?;
            rng.random_range(0..3u8)
        };
        let chosen = Move::from_code(code)
            .ok_or_else(|| StrategyError::new(format!("random code {} out of range", code)))?;
        debug!(round = context.round_number, chosen = %chosen, "Random move");
        Ok(chosen)
    }
}

/// Always plays the same move.
#[derive(Debug, Clone, Copy, derive_new::new)]
pub struct FixedStrategy {
    chosen: Move,
}

#[async_trait::async_trait]
impl MoveStrategy for FixedStrategy {
    fn name(&self) -> &str {
        match self.chosen {
            Move::Rock => "rock",
            Move::Paper => "paper",
            Move::Scissors => "scissors",
        }
    }

    async fn choose(&self, _context: &MoveContext) -> Result<Move, StrategyError> {
        Ok(self.chosen)
    }
}

/// Rotates through the moves by round number starting with rock.
#[derive(Debug, Clone, Copy)]
pub struct CycleStrategy;

#[async_trait::async_trait]
impl MoveStrategy for CycleStrategy {
    fn name(&self) -> &str {
        "cycle"
    }

    async fn choose(&self, context: &MoveContext) -> Result<Move, StrategyError> {
        let index = context.round_number.saturating_sub(1) % 3;
        Move::from_code(index as u8)
            .ok_or_else(|| StrategyError::new(format!("cycle index {} out of range", index)))
    }
}

/// Asks the operator on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveStrategy;

#[async_trait::async_trait]
impl MoveStrategy for InteractiveStrategy {
    fn name(&self) -> &str {
        "interactive"
    }

    #[instrument(skip(self, context), fields(round = context.round_number))]
    async fn choose(&self, context: &MoveContext) -> Result<Move, StrategyError> {
        let prompt = format!(
            "\nRound {}: choose your move [1] rock, [2] paper, [3] scissors: ",
            context.round_number
        );
        let line = prompt_line(prompt).await?;
        let chosen = parse_move_choice(&line)?;
        info!(chosen = %chosen, "Operator chose move");
        Ok(chosen)
    }
}

/// Parses `1`/`2`/`3` or a move name.
pub fn parse_move_choice(input: &str) -> Result<Move, StrategyError> {
    let trimmed = input.trim();
    match trimmed {
        "1" => Ok(Move::Rock),
        "2" => Ok(Move::Paper),
        "3" => Ok(Move::Scissors),
        other => other
            .parse()
            .map_err(|_| StrategyError::new(format!("'{}' is not a move", other))),
    }
}

/// Answers every question with the same text.
#[derive(Debug, Clone, derive_new::new)]
pub struct StaticAnswerProvider {
    #[new(into)]
    answer: String,
}

#[async_trait::async_trait]
impl AnswerProvider for StaticAnswerProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn answer(&self, _question: &str) -> Result<String, StrategyError> {
        Ok(self.answer.clone())
    }
}

/// Solves `a op b` arithmetic questions locally and gives a fixed answer
/// to anything else.
#[derive(Debug, Clone, derive_new::new)]
pub struct ArithmeticAnswerProvider {
    #[new(into)]
    fallback: String,
}

#[async_trait::async_trait]
impl AnswerProvider for ArithmeticAnswerProvider {
    fn name(&self) -> &str {
        "arithmetic"
    }

    async fn answer(&self, question: &str) -> Result<String, StrategyError> {
        match solve_arithmetic(question) {
            Some(answer) => {
                debug!(question, answer = %answer, "Solved arithmetic question");
                Ok(answer)
            }
            None => Ok(self.fallback.clone()),
        }
    }
}

/// Evaluates the first `<int> <op> <int>` found in `question`.
///
/// Operators may stand alone or touch their operands, so `2+2?` and
/// `2 + 2?` read the same.
pub fn solve_arithmetic(question: &str) -> Option<String> {
    let tokens = arithmetic_tokens(&question.to_lowercase());
    tokens.windows(3).find_map(|window| {
        let lhs: i64 = window[0].parse().ok()?;
        let rhs: i64 = window[2].parse().ok()?;
        let value = match window[1].as_str() {
            "+" | "plus" => lhs.checked_add(rhs)?,
            "-" | "minus" => lhs.checked_sub(rhs)?,
            "*" | "x" | "×" | "times" => lhs.checked_mul(rhs)?,
            "/" | "÷" => {
                if rhs == 0 || lhs % rhs != 0 {
                    return None;
                }
                lhs / rhs
            }
            _ => return None,
        };
        Some(value.to_string())
    })
}

fn arithmetic_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let decimal_point = c == '.'
            && is_digits(&current)
            && chars.peek().is_some_and(|next| next.is_ascii_digit());
        if c.is_alphanumeric() || decimal_point {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if matches!(c, '+' | '-' | '*' | '/' | '×' | '÷') {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.into_iter().flat_map(split_times).collect()
}

/// `6x7` is three tokens.
fn split_times(token: String) -> Vec<String> {
    if let Some((lhs, rhs)) = token.split_once('x')
        && is_digits(lhs)
        && is_digits(rhs)
    {
        return vec![lhs.to_string(), "x".to_string(), rhs.to_string()];
    }
    vec![token]
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Asks the operator on stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveAnswerProvider;

#[async_trait::async_trait]
impl AnswerProvider for InteractiveAnswerProvider {
    fn name(&self) -> &str {
        "interactive"
    }

    #[instrument(skip(self, question))]
    async fn answer(&self, question: &str) -> Result<String, StrategyError> {
        let line = prompt_line(format!("\nQuestion: {}\nYour answer: ", question)).await?;
        Ok(line.trim().to_string())
    }
}

/// Prints `prompt` and reads one line from stdin.
///
/// The read runs on a detached thread, so a caller that stops waiting does
/// not keep the runtime from shutting down.
async fn prompt_line(prompt: String) -> Result<String, StrategyError> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(read_line(&prompt));
    });
    rx.await
        .map_err(|_| StrategyError::new("Prompt thread ended without a reply"))?
}

fn read_line(prompt: &str) -> Result<String, StrategyError> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(prompt.as_bytes())
        .and_then(|_| stdout.flush())
        .map_err(|e| StrategyError::new(format!("Failed to write prompt: {}", e)))?;
    let mut line = String::new();
    let read = std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| StrategyError::new(format!("Failed to read stdin: {}", e)))?;
    if read == 0 {
        return Err(StrategyError::new("stdin closed"));
    }
    Ok(line)
}
