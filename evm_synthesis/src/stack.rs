//! The symbolic operand stack.

use crate::errors::{SynthesisError, SynthesisResult};
use crate::inputs::DEFAULT_MAX_STACK_HEIGHT;
use crate::wire::DataPt;

/// A bounded LIFO of wire references.
///
/// Slots past `len` are stale and get overwritten in place; the backing vector
/// never shrinks.
#[derive(Clone, Debug)]
pub struct StackPt {
    stack: Vec<DataPt>,
    len: usize,
    max_height: usize,
}

impl Default for StackPt {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK_HEIGHT)
    }
}

impl StackPt {
    pub fn new(max_height: usize) -> Self {
        Self {
            stack: Vec::new(),
            len: 0,
            max_height,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn max_height(&self) -> usize {
        self.max_height
    }

    pub fn push(&mut self, value: DataPt) -> SynthesisResult<()> {
        if value.wire().is_unbound() {
            return Err(SynthesisError::UnboundStackValue);
        }
        if self.len >= self.max_height {
            return Err(SynthesisError::StackOverflow(self.max_height));
        }
        if self.len < self.stack.len() {
            self.stack[self.len] = value;
        } else {
            self.stack.push(value);
        }
        self.len += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> SynthesisResult<DataPt> {
        self.check_underflow(1)?;
        self.len -= 1;
        Ok(self.stack[self.len].clone())
    }

    /// Pops `n` items, top of the stack first.
    pub fn pop_n(&mut self, n: usize) -> SynthesisResult<Vec<DataPt>> {
        let items = self.peek(n)?;
        self.len -= n;
        Ok(items)
    }

    /// Returns the top `n` items, top of the stack first.
    pub fn peek(&self, n: usize) -> SynthesisResult<Vec<DataPt>> {
        self.check_underflow(n)?;
        Ok(self.stack[self.len - n..self.len]
            .iter()
            .rev()
            .cloned()
            .collect())
    }

    /// Swaps the top item with the one `position` below it.
    pub fn swap(&mut self, position: usize) -> SynthesisResult<()> {
        self.check_underflow(position + 1)?;
        let head = self.len - 1;
        self.stack.swap(head, head - position);
        Ok(())
    }

    /// Pushes a copy of the `position`-th item, counting the top as 1.
    pub fn dup(&mut self, position: usize) -> SynthesisResult<()> {
        if position == 0 {
            return Err(SynthesisError::StackUnderflow {
                requested: 0,
                available: self.len,
            });
        }
        self.check_underflow(position)?;
        let value = self.stack[self.len - position].clone();
        self.push(value)
    }

    /// Swaps the items `i` and `j` below the top, the top being 0.
    pub fn exchange(&mut self, i: usize, j: usize) -> SynthesisResult<()> {
        self.check_underflow(i.max(j) + 1)?;
        let head = self.len - 1;
        self.stack.swap(head - i, head - j);
        Ok(())
    }

    /// Live items, bottom first.
    pub fn items(&self) -> &[DataPt] {
        &self.stack[..self.len]
    }

    fn check_underflow(&self, requested: usize) -> SynthesisResult<()> {
        if requested > self.len {
            return Err(SynthesisError::StackUnderflow {
                requested,
                available: self.len,
            });
        }
        Ok(())
    }
}
