use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};

use crate::{RelocateFn, relocate_fn};

/// The in-memory representation behind a [`SmallBox`][crate::SmallBox].
///
/// A storage value is in exactly one of three states:
///
/// * empty,
/// * heap-backed, holding a pointer obtained from [`Box`] or an allocation with the same layout,
/// * inline, holding an object in its own buffer.
///
/// Inline objects are never addressed through a stored absolute pointer, since the storage may be
/// moved bitwise at any time. Instead, [`as_ptr()`](Storage::as_ptr) rebuilds the pointer from
/// the current buffer address on every call.
///
/// The storage never drops or frees anything. The owner does that based on
/// [`is_inline()`](Storage::is_inline).
///
/// # Safety
///
/// Implementations must uphold the state model above: `as_ptr()` returns the pointer installed by
/// the last `set_heap()` or a pointer into the buffer after `set_inline()`, and `is_inline()` is
/// true only in the latter case.
pub unsafe trait Storage<T: ?Sized>: Sized {
    /// Whether this layout has a buffer at all.
    const INLINE: bool;

    /// Size of the buffer in bytes.
    const CAPACITY: usize;

    /// Alignment of the buffer in bytes.
    const ALIGN: usize;

    /// Whether inline objects require a relocation callback to be installed.
    const NEEDS_CALLBACK: bool;

    /// Creates an empty storage.
    #[must_use]
    fn empty() -> Self;

    /// Pointer to the owned object, rebuilt from the buffer address if inline.
    #[must_use]
    fn as_ptr(&self) -> Option<NonNull<T>>;

    /// Whether the owned object lives in the buffer.
    #[must_use]
    fn is_inline(&self) -> bool;

    /// Whether no object is owned.
    #[must_use]
    fn is_empty(&self) -> bool {
        self.as_ptr().is_none()
    }

    /// The callback that can relocate the current inline object, if one is known.
    #[must_use]
    fn relocate_fn(&self) -> Option<RelocateFn>;

    /// Start of the buffer.
    ///
    /// The returned pointer may be used for writes even though it is obtained from a shared
    /// reference.
    #[must_use]
    fn buffer(&self) -> NonNull<u8>;

    /// Switches to the heap-backed state (or the empty state for `None`).
    ///
    /// Any object in the buffer is forgotten, not dropped.
    fn set_heap(&mut self, ptr: Option<NonNull<T>>);

    /// Switches to the inline state.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - [`INLINE`](Storage::INLINE) is true.
    /// - `view` points into this storage's buffer, at a live object that starts at the buffer.
    /// - `relocate` is the callback for the object's concrete type whenever
    ///   [`NEEDS_CALLBACK`](Storage::NEEDS_CALLBACK) is true.
    unsafe fn set_inline(&mut self, view: NonNull<T>, relocate: Option<RelocateFn>);
}

/// Returns `ptr` with its data address replaced by `addr`, keeping any pointer metadata.
///
/// The new pointer carries the provenance of `addr`.
pub(crate) fn with_addr_of<T: ?Sized>(ptr: NonNull<T>, addr: NonNull<u8>) -> NonNull<T> {
    let mut raw = ptr.as_ptr();

    // SAFETY: The data address is the first word of both thin and wide pointers, so this
    // overwrites the address and leaves the vtable or length in place.
    unsafe {
        (&raw mut raw).cast::<*mut u8>().write(addr.as_ptr());
    }

    // SAFETY: `addr` is not null, so neither is the result.
    unsafe { NonNull::new_unchecked(raw) }
}

/// Data address stored in place of the real one while an object is inline.
///
/// No live object can start at the last address of the address space, since an allocation
/// never wraps around and a zero-sized object's dangling address is its alignment.
const INLINE_MARKER: usize = usize::MAX;

fn inline_marker() -> NonNull<u8> {
    // SAFETY: The marker address is not zero.
    unsafe { NonNull::new_unchecked(ptr::without_provenance_mut(INLINE_MARKER)) }
}

/// Raw inline bytes, writable through shared references.
#[repr(transparent)]
struct Buffer<const N: usize>(UnsafeCell<[MaybeUninit<u8>; N]>);

impl<const N: usize> Buffer<N> {
    const fn new() -> Self {
        Self(UnsafeCell::new([MaybeUninit::uninit(); N]))
    }

    fn start(&self) -> NonNull<u8> {
        NonNull::from(&self.0).cast()
    }
}

/// Storage with no buffer, only a pointer to a heap allocation.
///
/// Used by every owner under the [`Heap`][crate::Heap] budget.
pub struct HeapOnly<T: ?Sized> {
    data: Option<NonNull<T>>,
}

// SAFETY: The storage only ever holds the pointer given to `set_heap()` and is never inline.
unsafe impl<T: ?Sized> Storage<T> for HeapOnly<T> {
    const INLINE: bool = false;
    const CAPACITY: usize = 0;
    const ALIGN: usize = 1;
    const NEEDS_CALLBACK: bool = false;

    fn empty() -> Self {
        Self { data: None }
    }

    fn as_ptr(&self) -> Option<NonNull<T>> {
        self.data
    }

    fn is_inline(&self) -> bool {
        false
    }

    fn relocate_fn(&self) -> Option<RelocateFn> {
        None
    }

    fn buffer(&self) -> NonNull<u8> {
        NonNull::dangling()
    }

    fn set_heap(&mut self, ptr: Option<NonNull<T>>) {
        self.data = ptr;
    }

    #[cfg_attr(test, mutants::skip)] // Unreachable by contract.
    unsafe fn set_inline(&mut self, _view: NonNull<T>, _relocate: Option<RelocateFn>) {
        unreachable!("heap-only storage has no inline buffer");
    }
}

impl<T: ?Sized> fmt::Debug for HeapOnly<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapOnly")
            .field("data", &self.data)
            .finish()
    }
}

/// Storage for a sized type, whose buffer is the object's own storage when inline.
///
/// An explicit tag records whether the object lives in the buffer or on the heap.
#[repr(C)]
pub struct Overlapped<T, A, const N: usize> {
    _align: [A; 0],
    buffer: Buffer<N>,
    heap: Option<NonNull<T>>,
    inline: bool,
}

// SAFETY: The tag is set only by `set_inline()` and cleared by `set_heap()`, and `as_ptr()`
// follows it.
unsafe impl<T, A, const N: usize> Storage<T> for Overlapped<T, A, N> {
    const INLINE: bool = true;
    const CAPACITY: usize = N;
    const ALIGN: usize = align_of::<A>();
    const NEEDS_CALLBACK: bool = false;

    fn empty() -> Self {
        Self {
            _align: [],
            buffer: Buffer::new(),
            heap: None,
            inline: false,
        }
    }

    fn as_ptr(&self) -> Option<NonNull<T>> {
        if self.inline {
            Some(self.buffer.start().cast())
        } else {
            self.heap
        }
    }

    fn is_inline(&self) -> bool {
        self.inline
    }

    fn relocate_fn(&self) -> Option<RelocateFn> {
        // The concrete type is `T` itself, so the callback can be produced on demand.
        self.inline.then(relocate_fn::<T>)
    }

    fn buffer(&self) -> NonNull<u8> {
        self.buffer.start()
    }

    fn set_heap(&mut self, ptr: Option<NonNull<T>>) {
        self.heap = ptr;
        self.inline = false;
    }

    unsafe fn set_inline(&mut self, view: NonNull<T>, _relocate: Option<RelocateFn>) {
        debug_assert_eq!(view.cast::<u8>(), self.buffer.start());

        self.heap = None;
        self.inline = true;
    }
}

impl<T, A, const N: usize> fmt::Debug for Overlapped<T, A, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlapped")
            .field("capacity", &N)
            .field("heap", &self.heap)
            .field("inline", &self.inline)
            .finish_non_exhaustive()
    }
}

/// Storage for a trait object that relocates through a stored callback.
///
/// The object is inline exactly when the callback is set. The stored view pointer only carries
/// the vtable while inline, its address is rebuilt from the buffer.
#[repr(C)]
pub struct Tagged<T: ?Sized, A, const N: usize> {
    _align: [A; 0],
    buffer: Buffer<N>,
    data: Option<NonNull<T>>,
    relocate: Option<RelocateFn>,
}

// SAFETY: The callback is set only by `set_inline()` and cleared by `set_heap()`, and
// `as_ptr()` follows it.
unsafe impl<T: ?Sized, A, const N: usize> Storage<T> for Tagged<T, A, N> {
    const INLINE: bool = true;
    const CAPACITY: usize = N;
    const ALIGN: usize = align_of::<A>();
    const NEEDS_CALLBACK: bool = true;

    fn empty() -> Self {
        Self {
            _align: [],
            buffer: Buffer::new(),
            data: None,
            relocate: None,
        }
    }

    fn as_ptr(&self) -> Option<NonNull<T>> {
        match self.data {
            Some(data) if self.is_inline() => Some(with_addr_of(data, self.buffer.start())),
            data => data,
        }
    }

    fn is_inline(&self) -> bool {
        self.relocate.is_some()
    }

    fn relocate_fn(&self) -> Option<RelocateFn> {
        self.relocate
    }

    fn buffer(&self) -> NonNull<u8> {
        self.buffer.start()
    }

    fn set_heap(&mut self, ptr: Option<NonNull<T>>) {
        self.data = ptr;
        self.relocate = None;
    }

    unsafe fn set_inline(&mut self, view: NonNull<T>, relocate: Option<RelocateFn>) {
        assert!(
            relocate.is_some(),
            "inline trait objects without a relocation hook need a relocation callback"
        );
        debug_assert_eq!(view.cast::<u8>(), self.buffer.start());

        self.data = Some(view);
        self.relocate = relocate;
    }
}

impl<T: ?Sized, A, const N: usize> fmt::Debug for Tagged<T, A, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tagged")
            .field("capacity", &N)
            .field("data", &self.as_ptr())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}

/// Storage whose inline state is encoded in the data word of the view pointer.
///
/// While inline, the stored view carries a marker address that no live object can have and
/// only its metadata is meaningful. The real address is the start of the buffer. No extra
/// bookkeeping word is needed, so this layout has one word more of buffer than [`Tagged`].
/// Used for slices and for trait objects that relocate through [`Relocate`][crate::Relocate].
#[repr(C)]
pub struct Marked<T: ?Sized, A, const N: usize> {
    _align: [A; 0],
    buffer: Buffer<N>,
    data: Option<NonNull<T>>,
}

// SAFETY: The marker address is stored only by `set_inline()`, which requires the view to start
// at the buffer, and `set_heap()` never stores it because no object lives at that address.
unsafe impl<T: ?Sized, A, const N: usize> Storage<T> for Marked<T, A, N> {
    const INLINE: bool = true;
    const CAPACITY: usize = N;
    const ALIGN: usize = align_of::<A>();
    const NEEDS_CALLBACK: bool = false;

    fn empty() -> Self {
        Self {
            _align: [],
            buffer: Buffer::new(),
            data: None,
        }
    }

    fn as_ptr(&self) -> Option<NonNull<T>> {
        match self.data {
            Some(data) if self.is_inline() => Some(with_addr_of(data, self.buffer.start())),
            data => data,
        }
    }

    fn is_inline(&self) -> bool {
        self.data.is_some_and(|data| data.as_ptr().addr() == INLINE_MARKER)
    }

    fn relocate_fn(&self) -> Option<RelocateFn> {
        None
    }

    fn buffer(&self) -> NonNull<u8> {
        self.buffer.start()
    }

    fn set_heap(&mut self, ptr: Option<NonNull<T>>) {
        debug_assert!(ptr.is_none_or(|ptr| ptr.as_ptr().addr() != INLINE_MARKER));

        self.data = ptr;
    }

    unsafe fn set_inline(&mut self, view: NonNull<T>, _relocate: Option<RelocateFn>) {
        debug_assert_eq!(view.cast::<u8>(), self.buffer.start());

        self.data = Some(with_addr_of(view, inline_marker()));
    }
}

impl<T: ?Sized, A, const N: usize> fmt::Debug for Marked<T, A, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marked")
            .field("capacity", &N)
            .field("data", &self.as_ptr())
            .field("inline", &self.is_inline())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Display;

    use super::*;
    use crate::{Align8, Align64};

    #[test]
    fn with_addr_of_keeps_metadata() {
        let source = [1_u16, 2, 3];
        let target = [7_u16, 8, 9, 10];

        let view = NonNull::from(&source[..]);
        let moved = with_addr_of(view, NonNull::from(&target).cast());

        // SAFETY: The address points to `target`, which has at least as many elements as the
        // original slice length carried over.
        let moved = unsafe { moved.as_ref() };
        assert_eq!(moved, &[7, 8, 9]);
    }

    #[test]
    fn with_addr_of_keeps_vtable() {
        let first = 11_u32;
        let second = 22_u32;

        let view: NonNull<dyn Display> = NonNull::from(&first);
        let moved = with_addr_of(view, NonNull::from(&second).cast());

        // SAFETY: The address points to a `u32` and the vtable is that of `u32`.
        let moved = unsafe { moved.as_ref() };
        assert_eq!(moved.to_string(), "22");
    }

    #[test]
    fn overlapped_state_transitions() {
        let mut storage = Overlapped::<u64, Align8, 16>::empty();
        assert!(storage.is_empty());
        assert!(!storage.is_inline());
        assert!(storage.relocate_fn().is_none());

        let target = storage.buffer().cast::<u64>();
        // SAFETY: The buffer is 16 bytes, aligned to 8.
        unsafe {
            target.write(5);
        }
        // SAFETY: The view is the start of the buffer.
        unsafe {
            storage.set_inline(target, None);
        }

        assert!(storage.is_inline());
        assert!(storage.relocate_fn().is_some());
        assert_eq!(storage.as_ptr(), Some(target));

        let mut heap = Box::new(6_u64);
        storage.set_heap(Some(NonNull::from(&mut *heap)));

        assert!(!storage.is_inline());
        assert_eq!(storage.as_ptr(), Some(NonNull::from(&mut *heap)));
        assert!(storage.relocate_fn().is_none());
    }

    #[test]
    fn tagged_is_inline_only_with_callback() {
        let mut storage = Tagged::<dyn Display, Align8, 16>::empty();
        assert!(storage.is_empty());

        let mut heap = Box::new(1_u8);
        let view: NonNull<dyn Display> = NonNull::from(&mut *heap);
        storage.set_heap(Some(view));

        assert!(!storage.is_inline());
        assert_eq!(storage.as_ptr().map(NonNull::cast::<u8>), Some(view.cast()));

        let target = storage.buffer().cast::<u32>();
        // SAFETY: The buffer is 16 bytes, aligned to 8.
        unsafe {
            target.write(77);
        }
        // SAFETY: The buffer holds a live u32.
        let value: &dyn Display = unsafe { target.as_ref() };
        let view = NonNull::from(value);

        // SAFETY: The view points at the start of the buffer and the callback matches u32.
        unsafe {
            storage.set_inline(view, Some(relocate_fn::<u32>()));
        }

        assert!(storage.is_inline());
        // SAFETY: The storage holds a live u32.
        let shown = unsafe { storage.as_ptr().map(|p| p.as_ref().to_string()) };
        assert_eq!(shown.as_deref(), Some("77"));

        storage.set_heap(None);
        assert!(storage.is_empty());
        assert!(!storage.is_inline());
    }

    #[test]
    fn marked_keeps_inline_state_in_data_word() {
        let mut storage = Marked::<[u8], Align64, 8>::empty();
        assert!(storage.is_empty());
        assert!(!storage.is_inline());

        let target = storage.buffer();
        // SAFETY: The buffer is 8 bytes long.
        unsafe {
            target.write_bytes(3, 8);
        }
        let view = NonNull::slice_from_raw_parts(target, 8);

        // SAFETY: The view covers the buffer.
        unsafe {
            storage.set_inline(view, None);
        }

        assert!(storage.is_inline());
        assert_eq!(storage.as_ptr().map(NonNull::cast::<u8>), Some(target));

        // SAFETY: The storage holds 8 initialized bytes.
        let contents = unsafe { storage.as_ptr().map(|p| p.as_ref().to_vec()) };
        assert_eq!(contents, Some(vec![3; 8]));

        let mut heap = vec![4_u8; 3].into_boxed_slice();
        storage.set_heap(Some(NonNull::from(&mut *heap)));

        assert!(!storage.is_inline());
        // SAFETY: The storage points at the live boxed slice.
        let contents = unsafe { storage.as_ptr().map(|p| p.as_ref().to_vec()) };
        assert_eq!(contents, Some(vec![4; 3]));

        storage.set_heap(None);
        assert!(storage.is_empty());
        assert!(!storage.is_inline());
    }

    #[test]
    fn marked_has_no_bookkeeping_beyond_view_pointer() {
        assert_eq!(
            size_of::<Marked<dyn Display, Align8, 16>>(),
            16 + size_of::<NonNull<dyn Display>>()
        );
        assert_eq!(
            size_of::<Marked<dyn Display, Align8, 16>>() + size_of::<usize>(),
            size_of::<Tagged<dyn Display, Align8, 16>>()
        );
    }

    #[test]
    fn marked_zero_sized_heap_view_is_not_inline() {
        let mut storage = Marked::<[()], Align8, 8>::empty();

        let mut heap = vec![(); 4].into_boxed_slice();
        storage.set_heap(Some(NonNull::from(&mut *heap)));

        assert!(!storage.is_inline());
        assert_eq!(storage.as_ptr().map(NonNull::len), Some(4));
    }

    #[test]
    fn heap_only_never_inline() {
        let mut storage = HeapOnly::<dyn Display>::empty();
        assert!(storage.is_empty());

        let mut heap = Box::new(9_i32);
        let view: NonNull<dyn Display> = NonNull::from(&mut *heap);
        storage.set_heap(Some(view));

        assert!(!storage.is_empty());
        assert!(!storage.is_inline());
    }
}
