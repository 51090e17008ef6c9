//! A type-erased, move-only callable built on `SmallBox`.
//!
//! Closures that capture little state are stored inline. The `Invoke` trait opts into the
//! relocation hook, so the owner needs no per-type callback next to the closure.

use small_box::{Relocate, S64, SmallBox, define_small_dyn};

pub trait Invoke<R>: Relocate {
    fn invoke(&mut self) -> R;
}

impl<R, F: FnMut() -> R> Invoke<R> for F {
    fn invoke(&mut self) -> R {
        self()
    }
}

define_small_dyn!(Invoke<R>: Relocate);

/// An owning, move-only `FnMut() -> R` that avoids allocating for small closures.
pub struct MoveOnlyFn<R: 'static> {
    inner: SmallBox<dyn Invoke<R>, S64>,
}

impl<R: 'static> MoveOnlyFn<R> {
    pub fn new<F: FnMut() -> R + 'static>(f: F) -> Self {
        Self {
            inner: SmallBox::new(f).cast_invoke(),
        }
    }

    pub fn call(&mut self) -> R {
        self.inner.invoke()
    }

    pub fn is_inline(&self) -> bool {
        self.inner.is_inline()
    }

    /// Moves the callable out, leaving an empty one behind.
    pub fn take(&mut self) -> Self {
        Self {
            inner: self.inner.take(),
        }
    }
}

fn main() {
    let log = vec!["first".to_string(), "second".to_string()];
    let mut index = 0;

    // Captures a non-Clone vector by move.
    let mut next_entry = MoveOnlyFn::new(move || {
        let entry = log.get(index).cloned();
        index += 1;
        entry
    });

    let big_table = [7_u64; 64];
    let sum_table = MoveOnlyFn::new(move || big_table.iter().sum::<u64>());

    println!("next_entry inline: {}", next_entry.is_inline());
    println!("sum_table inline: {}", sum_table.is_inline());

    // Taking the callable relocates the inline closure through its hook.
    let mut moved = next_entry.take();

    println!("{:?}", moved.call());
    println!("{:?}", moved.call());
    println!("{:?}", moved.call());

    let mut sum_table = sum_table;
    println!("table sum: {}", sum_table.call());
}
