//! Face-expression observer.
//!
//! The real device drives an animated face on its display. On a host the
//! expressions are printed to the console instead.

use tracing::debug;

/// What the face is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expression {
    Idle,
    Blinking,
    Talking,
    Surprised,
}

/// Receives expression changes from the console loop.
pub(crate) trait FaceController {
    fn blink(&mut self);
    fn talk(&mut self, text: &str);
    fn surprise(&mut self);
    fn reset(&mut self);
}

/// Prints each expression change to stdout.
#[derive(Debug)]
pub(crate) struct ConsoleFace {
    expression: Expression,
}

impl ConsoleFace {
    pub(crate) fn new() -> Self {
        Self {
            expression: Expression::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) fn expression(&self) -> Expression {
        self.expression
    }

    fn set(&mut self, expression: Expression) {
        debug!("Face: {:?} -> {:?}", self.expression, expression);
        self.expression = expression;
    }
}

impl FaceController for ConsoleFace {
    fn blink(&mut self) {
        self.set(Expression::Blinking);
        println!("👁️ まばたき!");
    }

    fn talk(&mut self, text: &str) {
        self.set(Expression::Talking);
        println!("🎀 {}", text);
    }

    fn surprise(&mut self) {
        self.set(Expression::Surprised);
        println!("😲 びっくり!");
    }

    fn reset(&mut self) {
        self.set(Expression::Idle);
        println!("🔄 リセット");
    }
}
