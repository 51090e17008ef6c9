use std::any::Any;

use crate::{RelocationStrategy, Trivial, define_small_dyn};

/// A type that can be owned through a [`SmallBox`][crate::SmallBox].
///
/// The implementation selects the [relocation strategy][RelocationStrategy], which in turn fixes
/// the storage layout of the owner:
///
/// * every sized type and every slice uses [`Trivial`],
/// * trait objects are registered with [`define_small_dyn!`], which selects
///   [`Callback`][crate::Callback] or, for traits with [`Relocate`][crate::Relocate] as a
///   supertrait, [`VirtualHook`][crate::VirtualHook].
///
/// `dyn Any`, `dyn Any + Send` and `dyn Any + Send + Sync` are registered by this crate.
///
/// # Examples
///
/// Registering a trait with generic parameters requires a manual implementation:
///
/// ```rust
/// use small_box::{Callback, SmallBox, SmallPointee};
///
/// pub trait Source<T> {
///     fn next_item(&mut self) -> Option<T>;
/// }
///
/// impl<T> SmallPointee for dyn Source<T> {
///     type Relocation = Callback;
/// }
///
/// struct Countdown(u32);
///
/// impl Source<u32> for Countdown {
///     fn next_item(&mut self) -> Option<u32> {
///         self.0 = self.0.checked_sub(1)?;
///         Some(self.0)
///     }
/// }
///
/// let mut source: SmallBox<dyn Source<u32>> =
///     SmallBox::<Countdown>::new(Countdown(2)).cast(|c| c as &mut dyn Source<u32>);
///
/// assert_eq!(source.next_item(), Some(1));
/// assert_eq!(source.next_item(), Some(0));
/// assert_eq!(source.next_item(), None);
/// ```
pub trait SmallPointee {
    /// How inline objects of this view move between owners.
    type Relocation: RelocationStrategy<Self>;
}

impl<T> SmallPointee for T {
    type Relocation = Trivial;
}

impl<E> SmallPointee for [E] {
    type Relocation = Trivial;
}

define_small_dyn!(Any);

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::any::Any;

    use crate::{SmallBox, SmallBoxCastAny};

    #[test]
    fn any_cast_keeps_value_inline() {
        let boxed = SmallBox::<u16>::new(17).cast_any();

        assert!(boxed.is_inline());
        assert_eq!(boxed.downcast_ref::<u16>(), Some(&17));
    }

    #[test]
    fn any_send_views_are_registered() {
        let send: SmallBox<dyn Any + Send> =
            SmallBox::new(1_u8).cast(|v| -> &mut (dyn Any + Send) { v });
        let sync: SmallBox<dyn Any + Send + Sync> =
            SmallBox::new(2_u8).cast(|v| -> &mut (dyn Any + Send + Sync) { v });

        assert!(send.is::<u8>());
        assert!(sync.is::<u8>());
    }
}
