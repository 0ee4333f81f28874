//! Search values.
//!
//! A node's value is either an exact game outcome or a running sum of
//! rollout results, always seen from the side to move at that node.

use std::fmt;
use std::ops::Neg;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Decided(Outcome),
    Estimate(f64),
}

impl Value {
    pub const WIN: Value = Value::Decided(Outcome::Win);
    pub const LOSS: Value = Value::Decided(Outcome::Loss);
    pub const DRAW: Value = Value::Decided(Outcome::Draw);

    #[inline]
    pub fn is_decided(self) -> bool {
        matches!(self, Value::Decided(_))
    }

    #[inline]
    pub fn is_win(self) -> bool {
        self == Value::WIN
    }

    #[inline]
    pub fn is_loss(self) -> bool {
        self == Value::LOSS
    }

    #[inline]
    pub fn is_draw(self) -> bool {
        self == Value::DRAW
    }

    /// Value averaged over `sims` simulations, with outcomes mapped to
    /// +inf (win), -inf (loss) and 0 (draw) so values can be ranked.
    pub fn mean(self, sims: u32) -> f64 {
        match self {
            Value::Decided(Outcome::Win) => f64::INFINITY,
            Value::Decided(Outcome::Loss) => f64::NEG_INFINITY,
            Value::Decided(Outcome::Draw) => 0.0,
            Value::Estimate(v) => v / f64::from(sims.max(1)),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Estimate(0.0)
    }
}

/// The same value seen by the other player.
impl Neg for Value {
    type Output = Value;

    fn neg(self) -> Value {
        match self {
            Value::Decided(Outcome::Win) => Value::LOSS,
            Value::Decided(Outcome::Loss) => Value::WIN,
            Value::Decided(Outcome::Draw) => Value::DRAW,
            Value::Estimate(v) => Value::Estimate(-v),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Decided(Outcome::Win) => f.write_str("win"),
            Value::Decided(Outcome::Loss) => f.write_str("loss"),
            Value::Decided(Outcome::Draw) => f.write_str("draw"),
            Value::Estimate(v) => write!(f, "{v:.3}"),
        }
    }
}
