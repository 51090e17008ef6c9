use std::ptr::{self, NonNull};

use crate::{Budget, Storage};

/// Type-erased function that moves an object of one concrete type from `src` to `dst`.
///
/// After the call, the bytes at `src` are logically uninitialized and the object lives at `dst`.
/// Obtained from [`relocate_fn()`].
pub type RelocateFn = unsafe fn(src: NonNull<u8>, dst: NonNull<u8>);

/// Returns the relocation callback for objects of concrete type `U`.
///
/// # Examples
///
/// ```rust
/// use std::mem::MaybeUninit;
/// use std::ptr::NonNull;
///
/// use small_box::relocate_fn;
///
/// let mut source = MaybeUninit::new(String::from("moved"));
/// let mut target = MaybeUninit::<String>::uninit();
///
/// let relocate = relocate_fn::<String>();
///
/// // SAFETY: The source holds a live String and the target is valid for String writes.
/// unsafe {
///     relocate(
///         NonNull::from(&mut source).cast(),
///         NonNull::from(&mut target).cast(),
///     );
/// }
///
/// // SAFETY: The relocation initialized the target and left the source logically empty.
/// let moved = unsafe { target.assume_init() };
/// assert_eq!(moved, "moved");
/// ```
#[must_use]
pub fn relocate_fn<U>() -> RelocateFn {
    relocate_value::<U>
}

/// # Safety
///
/// `src` must point to a live `U` that the caller gives up. `dst` must be valid and aligned for
/// `U` writes and must not overlap `src`.
unsafe fn relocate_value<U>(src: NonNull<u8>, dst: NonNull<u8>) {
    // SAFETY: Forwarding the caller's guarantee that `src` holds a live `U`.
    let value = unsafe { src.cast::<U>().read() };

    // SAFETY: Forwarding the caller's guarantee that `dst` is valid for `U` writes.
    unsafe {
        dst.cast::<U>().write(value);
    }
}

/// Opt-in relocation hook, callable through a trait object.
///
/// A trait that lists `Relocate` as a supertrait lets a
/// [`SmallBox`][crate::SmallBox] of that trait object move its inline object through the vtable
/// instead of through a stored callback. Register such a trait with
/// `define_small_dyn!(Trait: Relocate)`.
///
/// Every sized type implements this trait, so any concrete type in the hierarchy is covered.
///
/// # Examples
///
/// ```rust
/// use small_box::{Relocate, SmallBox, define_small_dyn};
///
/// pub trait Greeter: Relocate {
///     fn greet(&self) -> String;
/// }
///
/// define_small_dyn!(Greeter: Relocate);
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// let mut a = SmallBox::<English>::new(English).cast_greeter();
/// let b = a.take();
///
/// assert!(a.is_empty());
/// assert_eq!(b.greet(), "hello");
/// ```
pub trait Relocate {
    /// Moves `self` to `dst`, leaving the current location logically uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `dst` is valid for writes of `size_of_val(self)` bytes and aligned for `Self`.
    /// - `dst` does not overlap `self`.
    /// - The object at the current location is never used or dropped after the call.
    unsafe fn relocate_to(&mut self, dst: NonNull<u8>);
}

impl<T> Relocate for T {
    unsafe fn relocate_to(&mut self, dst: NonNull<u8>) {
        // SAFETY: The caller gives up the object at `self`, reading it out is a move.
        let value = unsafe { ptr::read(self) };

        // SAFETY: The caller guarantees `dst` is valid and aligned for `T` writes.
        unsafe {
            dst.cast::<T>().write(value);
        }
    }
}

mod sealed {
    #[allow(unnameable_types, reason = "sealed trait, only named inside this crate")]
    pub trait Sealed {}

    impl Sealed for super::Trivial {}
    impl Sealed for super::Callback {}
    impl Sealed for super::VirtualHook {}
}

/// How the inline object behind an owned view `T` moves from one address to another.
///
/// The strategy is chosen once per view type via [`SmallPointee`][crate::SmallPointee] and also
/// fixes the storage layout, since each strategy needs different bookkeeping next to the buffer.
pub trait RelocationStrategy<T: ?Sized>: sealed::Sealed {
    /// Storage layout used by owners of `T` under budget `B`.
    type Storage<B: Budget>: Storage<T>;

    /// How many of `capacity` buffer bytes (aligned to `align`) are usable for the view.
    #[doc(hidden)]
    fn usable_capacity(capacity: usize, align: usize) -> usize;

    /// Moves the object viewed through `view`, whose storage starts at `src`, to `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `view` points to a live object stored at `src` that the caller gives up.
    /// - `dst` is valid for writes of the object's size, suitably aligned and does not overlap
    ///   `src`.
    /// - `callback`, if the strategy uses one, was created for the object's concrete type.
    #[doc(hidden)]
    unsafe fn relocate(
        view: NonNull<T>,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        callback: Option<RelocateFn>,
    );
}

/// Relocation for sized non-polymorphic types and slices: a plain bitwise move.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Trivial;

/// Relocation for trait objects through a per-concrete-type callback stored next to the object.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct Callback;

/// Relocation for trait objects through [`Relocate::relocate_to()`], dispatched via the vtable.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct VirtualHook;

impl<T> RelocationStrategy<T> for Trivial {
    type Storage<B: Budget> = B::OverlappedStorage<T>;

    fn usable_capacity(capacity: usize, align: usize) -> usize {
        if size_of::<T>() <= capacity && align_of::<T>() <= align {
            size_of::<T>()
        } else {
            0
        }
    }

    unsafe fn relocate(
        _view: NonNull<T>,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        _callback: Option<RelocateFn>,
    ) {
        // SAFETY: Forwarding the caller's guarantees. The concrete type is `T` itself.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), size_of::<T>());
        }
    }
}

impl<E> RelocationStrategy<[E]> for Trivial {
    type Storage<B: Budget> = B::MarkedStorage<[E]>;

    fn usable_capacity(capacity: usize, align: usize) -> usize {
        if align_of::<E>() > align {
            return 0;
        }

        // Zero-sized elements take no bytes no matter how many there are.
        capacity
            .checked_div(size_of::<E>())
            .map_or(0, |elements| elements.saturating_mul(size_of::<E>()))
    }

    unsafe fn relocate(
        view: NonNull<[E]>,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        _callback: Option<RelocateFn>,
    ) {
        // SAFETY: The caller guarantees the view points to a live slice.
        let len = size_of_val(unsafe { view.as_ref() });

        // SAFETY: Forwarding the caller's guarantees about `src` and `dst`.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), len);
        }
    }
}

impl<T: ?Sized> RelocationStrategy<T> for Callback {
    type Storage<B: Budget> = B::TaggedStorage<T>;

    fn usable_capacity(capacity: usize, _align: usize) -> usize {
        capacity
    }

    unsafe fn relocate(
        view: NonNull<T>,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        callback: Option<RelocateFn>,
    ) {
        if let Some(callback) = callback {
            // SAFETY: Forwarding the caller's guarantees, including the callback matching the
            // concrete type of the object.
            unsafe {
                callback(src, dst);
            }
        } else {
            // Every Rust value may be moved bitwise, so without a callback we copy the bytes.
            // SAFETY: The caller guarantees the view points to a live object.
            let len = size_of_val(unsafe { view.as_ref() });

            // SAFETY: Forwarding the caller's guarantees about `src` and `dst`.
            unsafe {
                ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), len);
            }
        }
    }
}

impl<T: ?Sized + Relocate> RelocationStrategy<T> for VirtualHook {
    type Storage<B: Budget> = B::MarkedStorage<T>;

    fn usable_capacity(capacity: usize, _align: usize) -> usize {
        capacity
    }

    unsafe fn relocate(
        mut view: NonNull<T>,
        _src: NonNull<u8>,
        dst: NonNull<u8>,
        _callback: Option<RelocateFn>,
    ) {
        // SAFETY: The caller guarantees the view points to a live object it gives up.
        let object = unsafe { view.as_mut() };

        // SAFETY: Forwarding the caller's guarantees about `dst`.
        unsafe {
            object.relocate_to(dst);
        }
    }
}
