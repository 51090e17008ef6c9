//! A move-only owning pointer that stores small objects inline and everything else on the heap.
//!
//! This crate provides [`SmallBox`], a single-owner smart pointer similar to [`Box`]. Unlike
//! [`Box`], a [`SmallBox`] reserves a fixed number of bytes inside itself and places any object
//! that fits there, avoiding a heap allocation. Objects that are too large or too strictly aligned
//! are allocated on the heap, transparently to the user.
//!
//! # Key Features
//!
//! - **Inline storage**: small objects live inside the owner, no allocation required
//! - **Heap fallback**: large or over-aligned objects are allocated on the heap automatically
//! - **Configurable size**: the [`Budget`] type parameter ([`S24`] through [`S256`], or [`Heap`])
//!   fixes the total size of the owner
//! - **Trait objects and slices**: own `dyn Trait` and `[T]` views of concrete objects
//! - **View conversions**: convert to trait objects and upcast to supertraits via
//!   [`cast()`](SmallBox::cast) and the `cast_<trait>()` methods generated by
//!   [`define_small_dyn!`]
//! - **Relocation strategies**: trait objects move through a stored callback or through an
//!   opt-in [`Relocate`] hook dispatched via the vtable
//! - **Move-only**: a [`SmallBox`] cannot be cloned, ownership moves with
//!   [`take()`](SmallBox::take) and [`swap()`](SmallBox::swap)
//! - **Identity semantics**: comparison and hashing look at the object address, which moves
//!   with the box for inline objects
//! - **Thread mobility**: [`Send`] and [`Sync`] follow the owned type
//!
//! # Storage layouts
//!
//! The owned view decides what bookkeeping sits next to the inline buffer:
//!
//! - sized types carry a heap pointer and a state tag,
//! - trait objects registered with `define_small_dyn!(Trait)` carry the view pointer and a
//!   relocation callback for the concrete type,
//! - trait objects registered with `define_small_dyn!(Trait: Relocate)` and slices carry only
//!   the view pointer, which marks the inline state in its address word, and so get one word
//!   more of inline storage than callback-relocated trait objects.
//!
//! Whatever is left of the budget is inline storage. See [`Budget`] for the exact sizes.
//!
//! # Examples
//!
//! ## Sized values
//!
//! ```rust
//! use small_box::{S32, SmallBox};
//!
//! let small = SmallBox::<u64, S32>::new(42);
//! let large = SmallBox::<[u64; 16], S32>::new([7; 16]);
//!
//! assert!(small.is_inline());
//! assert!(!large.is_inline());
//! assert_eq!(size_of::<SmallBox<[u64; 16], S32>>(), 32);
//!
//! assert_eq!(*small, 42);
//! assert_eq!(large[15], 7);
//! ```
//!
//! ## Trait objects
//!
//! ```rust
//! use small_box::{SmallBox, define_small_dyn};
//!
//! pub trait Animal {
//!     fn sound(&self) -> &'static str;
//! }
//!
//! define_small_dyn!(Animal);
//!
//! struct Cat;
//!
//! impl Animal for Cat {
//!     fn sound(&self) -> &'static str {
//!         "meow"
//!     }
//! }
//!
//! let mut animals: Vec<SmallBox<dyn Animal>> = vec![SmallBox::new(Cat).cast_animal()];
//!
//! let first = animals[0].take();
//! assert!(animals[0].is_empty());
//! assert_eq!(first.sound(), "meow");
//! ```
//!
//! ## Slices
//!
//! ```rust
//! use small_box::SmallBox;
//!
//! let digits = SmallBox::<[u8]>::from_fn(5, |i| i as u8);
//!
//! assert!(digits.is_inline());
//! assert_eq!(digits.iter().sum::<u8>(), 10);
//! ```

mod error;
mod factory;
mod layout;
mod macros;
mod owner;
mod placement;
mod pointee;
mod relocation;
mod storage;

pub use error::*;
pub use layout::*;
pub use owner::*;
pub use placement::*;
pub use pointee::*;
pub use relocation::*;
pub use storage::*;

#[doc(hidden)]
pub mod __private {
    pub use paste;
}
