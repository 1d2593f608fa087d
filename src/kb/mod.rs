//! The knowledge base: a logical context mirroring the lexical scope stack
//!
//! A [`KnowledgeBase`] holds the formulas currently assumed true. Entering a
//! scope pushes a child frame; a child behaves as if it contained every
//! ancestor assumption, and popping the frame discards exactly what the
//! scope added. The proof-pass walker owns the frame discipline through
//! [`KnowledgeBase::with_child`], which restores the parent frame on every
//! exit path.
//!
//! Formulas arrive as text in the prover vocabulary and are parsed on entry;
//! the translator only emits well-formed text, so a syntax error is a fatal
//! internal error ([`Fatal`]), never a user-level proof failure.

pub mod formula;
pub mod solve;

use formula::Term;
use solve::{Budget, LimitReached};

/// The three prover verdicts
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProofResult {
    ProvenTrue,
    /// The prover could not establish the claim from the current assumptions
    Unsupported,
    /// The prover ran into its resource limit before reaching a verdict
    ReachedLimit,
}

/// An internal failure that aborts the proof pass
#[derive(Debug, Clone)]
pub struct Fatal {
    pub message: String,
}

impl Fatal {
    pub fn new(message: impl Into<String>) -> Self {
        Fatal {
            message: message.into(),
        }
    }
}

/// One scope's worth of assumptions
#[derive(Debug, Default)]
struct Frame {
    facts: Vec<Term>,
}

#[derive(Debug)]
pub struct KnowledgeBase {
    frames: Vec<Frame>,
    budget: Budget,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::with_budget(Budget::default())
    }

    pub fn with_budget(budget: Budget) -> Self {
        KnowledgeBase {
            frames: vec![Frame::default()],
            budget,
        }
    }

    /// The current frame depth; the root is depth zero
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Adds a formula as a truth in the current frame
    pub fn assume(&mut self, formula: &str) -> Result<(), Fatal> {
        let term = self.parse(formula)?;
        self.frames.last_mut().unwrap().facts.push(term);
        Ok(())
    }

    /// Attempts a proof without changing the knowledge base
    pub fn prove_if_proven(&mut self, formula: &str) -> Result<ProofResult, Fatal> {
        let goal = self.parse(formula)?;
        self.prove_term(&goal)
    }

    /// Attempts a proof; on success the formula becomes a fresh assumption
    pub fn assume_if_proven(&mut self, formula: &str) -> Result<ProofResult, Fatal> {
        let goal = self.parse(formula)?;
        let result = self.prove_term(&goal)?;
        if result == ProofResult::ProvenTrue {
            self.frames.last_mut().unwrap().facts.push(goal);
        }
        Ok(result)
    }

    /// Attempts a proof; on success every assumption of the *current* frame
    /// is discarded and replaced by the formula. This is the summarization
    /// behind the means-statement: readers may start reading from the last
    /// means-statement upward.
    pub fn substitute_if_proven(&mut self, formula: &str) -> Result<ProofResult, Fatal> {
        let goal = self.parse(formula)?;
        let result = self.prove_term(&goal)?;
        if result == ProofResult::ProvenTrue {
            let frame = self.frames.last_mut().unwrap();
            frame.facts.clear();
            frame.facts.push(goal);
        }
        Ok(result)
    }

    /// Runs `f` inside a fresh child frame, popping it on every exit path
    pub fn with_child<R>(&mut self, f: impl FnOnce(&mut KnowledgeBase) -> R) -> R {
        self.push_child();
        let result = f(self);
        self.pop_child();
        result
    }

    /// Opens a child frame. Prefer [`with_child`]; this exists for callers
    /// that need to interleave other work between push and pop, and those
    /// callers must pop on every exit path themselves.
    ///
    /// [`with_child`]: KnowledgeBase::with_child
    pub fn push_child(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_child(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the root frame");
        self.frames.pop();
    }

    fn parse(&self, formula: &str) -> Result<Term, Fatal> {
        formula::parse(formula).map_err(|e| {
            Fatal::new(format!(
                "the prover rejected a formula: {} (in `{}`)",
                e.message, formula
            ))
        })
    }

    fn prove_term(&self, goal: &Term) -> Result<ProofResult, Fatal> {
        let facts: Vec<Term> = self
            .frames
            .iter()
            .flat_map(|f| f.facts.iter().cloned())
            .collect();
        match solve::entails(&facts, goal, &self.budget) {
            Ok(true) => Ok(ProofResult::ProvenTrue),
            Ok(false) => Ok(ProofResult::Unsupported),
            Err(LimitReached) => Ok(ProofResult::ReachedLimit),
        }
    }
}
