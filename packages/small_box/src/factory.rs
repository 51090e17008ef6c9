use std::mem::MaybeUninit;
use std::pin::Pin;
use std::ptr::{self, NonNull};

use scopeguard::ScopeGuard;
use tracing::trace;

use crate::storage::with_addr_of;
use crate::{Budget, InlineError, Placement, SmallBox, SmallPointee, relocate_fn};

impl<T, B: Budget> SmallBox<T, B> {
    /// Creates a `SmallBox` that owns `value`, inline if it fits and on the heap otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let small = SmallBox::<u64>::new(5);
    /// let large = SmallBox::<[u64; 100]>::new([5; 100]);
    ///
    /// assert!(small.is_inline());
    /// assert!(!large.is_inline());
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::new_in(value, Placement::Auto)
    }

    /// Creates a `SmallBox` that owns `value`, placed as requested.
    #[must_use]
    pub fn new_in(value: T, placement: Placement) -> Self {
        Self::new_unsize_in(value, placement, |value| value)
    }

    /// Creates a `SmallBox` that owns `value` inline, handing the value back if it does not fit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{S32, SmallBox};
    ///
    /// let inline = SmallBox::<u64, S32>::try_new_inline(1).unwrap();
    /// assert!(inline.is_inline());
    ///
    /// let error = SmallBox::<[u64; 10], S32>::try_new_inline([2; 10]).unwrap_err();
    /// assert_eq!(error.into_inner(), [2; 10]);
    /// ```
    pub fn try_new_inline(value: T) -> Result<Self, InlineError<T>> {
        if Self::is_always_heap_allocated() {
            return Err(InlineError::new(value, Self::CAPACITY, Self::ALIGN));
        }

        Ok(Self::new(value))
    }

    /// Creates a pinned `SmallBox` that owns `value`.
    ///
    /// Pinned objects are always allocated on the heap, since inline objects move with their
    /// owner.
    #[must_use]
    pub fn pin(value: T) -> Pin<Self> {
        Self::new_in(value, Placement::Heap).into_pin()
    }

    /// Creates a `SmallBox` with storage for a `T` that is not yet initialized.
    ///
    /// The storage is inline under the same conditions as for an initialized `T`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut uninit = SmallBox::<u32>::new_uninit();
    /// uninit.write(9);
    ///
    /// // SAFETY: We just initialized the value.
    /// let value = unsafe { uninit.assume_init() };
    /// assert_eq!(*value, 9);
    /// ```
    #[must_use]
    pub fn new_uninit() -> SmallBox<MaybeUninit<T>, B> {
        SmallBox::new(MaybeUninit::uninit())
    }
}

impl<T, B: Budget> SmallBox<MaybeUninit<T>, B> {
    /// Converts to a `SmallBox<T>`, keeping the object where it is stored.
    ///
    /// # Safety
    ///
    /// The owned value must be initialized, or the box must be empty.
    #[must_use]
    pub unsafe fn assume_init(self) -> SmallBox<T, B> {
        self.transfer(NonNull::cast::<T>)
    }

    /// Initializes the owned value and converts to a `SmallBox<T>`.
    ///
    /// # Panics
    ///
    /// Panics if the box is empty.
    #[must_use]
    pub fn init(mut self, value: T) -> SmallBox<T, B> {
        self.write(value);

        // SAFETY: We just initialized the value.
        unsafe { self.assume_init() }
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> SmallBox<T, B> {
    /// Takes ownership of a heap-allocated object.
    ///
    /// The object stays where it is and is never moved into the inline buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let boxed = SmallBox::<[u32]>::from_box(vec![1, 2, 3].into_boxed_slice());
    ///
    /// assert!(!boxed.is_inline());
    /// assert_eq!(boxed.len(), 3);
    /// ```
    #[must_use]
    pub fn from_box(boxed: Box<T>) -> Self {
        let mut result = Self::empty();
        result.adopt_heap(NonNull::from(Box::leak(boxed)));
        result
    }

    /// Creates a `SmallBox` of an unsized view (such as a trait object) from a sized value.
    ///
    /// `coerce` receives the value and returns it as the view, typically with an unsizing
    /// coercion such as `value as &mut dyn Trait`. The value is stored inline if its concrete
    /// size and alignment fit, otherwise on the heap.
    ///
    /// # Panics
    ///
    /// Panics if `coerce` returns a reference to anything other than the whole value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{SmallBox, define_small_dyn};
    ///
    /// pub trait Area {
    ///     fn area(&self) -> u32;
    /// }
    ///
    /// define_small_dyn!(Area);
    ///
    /// struct Rectangle(u32, u32);
    ///
    /// impl Area for Rectangle {
    ///     fn area(&self) -> u32 {
    ///         self.0 * self.1
    ///     }
    /// }
    ///
    /// let shape = SmallBox::<dyn Area>::new_unsize(Rectangle(2, 3), |r| r as &mut dyn Area);
    ///
    /// assert!(shape.is_inline());
    /// assert_eq!(shape.area(), 6);
    /// ```
    #[must_use]
    pub fn new_unsize<U>(value: U, coerce: impl FnOnce(&mut U) -> &mut T) -> Self {
        Self::new_unsize_in(value, Placement::Auto, coerce)
    }

    /// Creates a `SmallBox` of an unsized view from a sized value, placed as requested.
    ///
    /// # Panics
    ///
    /// Panics if `coerce` returns a reference to anything other than the whole value.
    #[must_use]
    pub fn new_unsize_in<U>(
        mut value: U,
        placement: Placement,
        coerce: impl FnOnce(&mut U) -> &mut T,
    ) -> Self {
        let view = coerce(&mut value);
        let view_size = size_of_val(view);
        let view = NonNull::from(view);

        assert!(
            ptr::addr_eq(view.as_ptr(), &raw const value) && view_size == size_of::<U>(),
            "SmallBox view of a new value must cover exactly that value"
        );

        let mut result = Self::empty();

        if placement == Placement::Auto && Self::fits(size_of::<U>(), align_of::<U>()) {
            let target = result.buffer().cast::<U>();

            // SAFETY: The size and alignment of `U` fit the empty buffer.
            unsafe {
                target.write(value);
            }

            // SAFETY: The view points at the object we just wrote to the start of the buffer and
            // the callback is the one for its concrete type.
            unsafe {
                result.adopt_inline(with_addr_of(view, target.cast()), Some(relocate_fn::<U>()));
            }
        } else {
            if placement == Placement::Auto {
                trace!(
                    size = size_of::<U>(),
                    align = align_of::<U>(),
                    capacity = Self::CAPACITY,
                    "value does not fit inline storage, allocating it on the heap"
                );
            }

            let heap = NonNull::from(Box::leak(Box::new(value)));
            result.adopt_heap(with_addr_of(view, heap.cast()));
        }

        result
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> From<Box<T>> for SmallBox<T, B> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<E, B: Budget> SmallBox<[E], B> {
    /// Creates a slice of `len` elements, each produced by calling `f` with its index.
    ///
    /// The slice is stored inline if it has at most
    /// [`inline_array_capacity()`](Self::inline_array_capacity) elements.
    ///
    /// If `f` panics, the elements created so far are dropped and the panic continues.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let squares = SmallBox::<[u32]>::from_fn(4, |i| (i * i) as u32);
    ///
    /// assert!(squares.is_inline());
    /// assert_eq!(*squares, [0, 1, 4, 9]);
    /// ```
    #[must_use]
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> E) -> Self {
        Self::from_fn_in(len, Placement::Auto, f)
    }

    /// Creates a slice of `len` elements produced by `f`, placed as requested.
    #[must_use]
    pub fn from_fn_in(len: usize, placement: Placement, mut f: impl FnMut(usize) -> E) -> Self {
        if placement == Placement::Heap || len > Self::inline_array_capacity() {
            if placement == Placement::Auto {
                trace!(
                    len,
                    capacity = Self::inline_array_capacity(),
                    "slice does not fit inline storage, allocating it on the heap"
                );
            }

            return Self::from_box((0..len).map(f).collect());
        }

        let mut result = Self::empty();
        let first = result.buffer().cast::<E>();

        // Drops the elements written so far if `f` panics.
        let mut initialized = scopeguard::guard(0_usize, |count| {
            // SAFETY: Exactly `count` leading elements have been written and nothing else owns
            // them yet.
            unsafe {
                ptr::drop_in_place(NonNull::slice_from_raw_parts(first, count).as_ptr());
            }
        });

        for index in 0..len {
            let element = f(index);

            // SAFETY: `index < len`, which fits the buffer as checked above.
            unsafe {
                first.add(index).write(element);
            }

            *initialized = index.wrapping_add(1);
        }

        ScopeGuard::into_inner(initialized);

        // SAFETY: All `len` elements are initialized, starting at the start of the buffer.
        unsafe {
            result.adopt_inline(NonNull::slice_from_raw_parts(first, len), None);
        }

        result
    }

    /// Creates a slice of `len` default elements.
    #[must_use]
    pub fn new_slice_default(len: usize) -> Self
    where
        E: Default,
    {
        Self::from_fn(len, |_| E::default())
    }

    /// Creates a slice of `len` elements that are not yet initialized.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut slice = SmallBox::<[u16]>::new_uninit_slice(3);
    ///
    /// for (index, element) in slice.iter_mut().enumerate() {
    ///     element.write(index as u16 * 10);
    /// }
    ///
    /// // SAFETY: Every element was initialized above.
    /// let slice = unsafe { slice.assume_init() };
    /// assert_eq!(*slice, [0, 10, 20]);
    /// ```
    #[must_use]
    pub fn new_uninit_slice(len: usize) -> SmallBox<[MaybeUninit<E>], B> {
        SmallBox::from_fn(len, |_| MaybeUninit::uninit())
    }
}

impl<E, B: Budget> SmallBox<[MaybeUninit<E>], B> {
    /// Converts to a `SmallBox<[E]>`, keeping the elements where they are stored.
    ///
    /// # Safety
    ///
    /// Every element must be initialized, or the box must be empty.
    #[must_use]
    pub unsafe fn assume_init(self) -> SmallBox<[E], B> {
        self.transfer(|elements| {
            NonNull::slice_from_raw_parts(elements.cast::<E>(), elements.len())
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::any::Any;
    use std::cell::Cell;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use super::*;
    use crate::{Heap, S24, S32, S64};

    struct Counted(Rc<Cell<usize>>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn new_places_by_fit() {
        assert!(SmallBox::<u64, S24>::new(1).is_inline());
        assert!(!SmallBox::<u128, S24>::new(1).is_inline());
        assert!(!SmallBox::<u8, Heap>::new(1).is_inline());
    }

    #[test]
    fn new_in_heap_is_never_inline() {
        let boxed = SmallBox::<u8, S64>::new_in(3, Placement::Heap);

        assert!(!boxed.is_inline());
        assert_eq!(*boxed, 3);
    }

    #[test]
    fn try_new_inline_reports_layouts() {
        let error = SmallBox::<[u8; 64], S32>::try_new_inline([1; 64]).unwrap_err();

        assert!(error.to_string().contains("64 bytes"));
        assert_eq!(error.into_inner(), [1; 64]);
    }

    #[test]
    fn over_aligned_value_goes_to_heap() {
        #[repr(align(128))]
        struct Aligned(u8);

        let boxed = SmallBox::<Aligned, S64>::new(Aligned(4));

        assert!(!boxed.is_inline());
        assert_eq!(boxed.0, 4);
        assert_eq!(boxed.as_ptr().map(|p| p.as_ptr().addr() % 128), Some(0));
    }

    #[test]
    fn zero_sized_values_are_inline() {
        assert!(SmallBox::<(), S24>::new(()).is_inline());
        assert!(SmallBox::<[(); 3]>::new([(); 3]).is_inline());
        assert!(SmallBox::<[()]>::from_fn(1000, |_| ()).is_inline());
    }

    #[test]
    fn new_unsize_stores_concrete_size() {
        let small = SmallBox::<dyn Any>::new_unsize(1_u8, |v| -> &mut dyn Any { v });
        let large = SmallBox::<dyn Any>::new_unsize([0_u8; 200], |v| -> &mut dyn Any { v });

        assert!(small.is_inline());
        assert!(!large.is_inline());
        assert!(small.is::<u8>());
        assert!(large.is::<[u8; 200]>());
    }

    #[test]
    #[should_panic]
    fn new_unsize_rejects_partial_view() {
        let _boxed = SmallBox::<u16>::new_unsize((1_u16, 2_u16), |pair| &mut pair.1);
    }

    #[test]
    fn from_box_stays_on_heap() {
        let boxed: SmallBox<[u8]> = Box::<[u8]>::from([1, 2, 3]).into();

        assert!(!boxed.is_inline());
        assert_eq!(*boxed, [1, 2, 3]);
    }

    #[test]
    fn uninit_round_trip() {
        let mut uninit = SmallBox::<String>::new_uninit();
        uninit.write(String::from("ready"));

        // SAFETY: Initialized above.
        let value = unsafe { uninit.assume_init() };

        assert!(value.is_inline());
        assert_eq!(*value, "ready");

        let value = SmallBox::<String>::new_uninit().init(String::from("again"));
        assert_eq!(*value, "again");
    }

    #[test]
    fn from_fn_inline_and_heap() {
        let capacity = SmallBox::<[u32]>::inline_array_capacity();

        let inline = SmallBox::<[u32]>::from_fn(capacity, |i| u32::try_from(i).unwrap());
        let heap = SmallBox::<[u32]>::from_fn(capacity + 1, |i| u32::try_from(i).unwrap());

        assert!(inline.is_inline());
        assert!(!heap.is_inline());
        assert_eq!(inline.len(), capacity);
        assert_eq!(heap.len(), capacity + 1);
        assert_eq!(heap.last().copied(), u32::try_from(capacity).ok());
    }

    #[test]
    fn from_fn_in_heap() {
        let boxed = SmallBox::<[u8]>::from_fn_in(2, Placement::Heap, |i| u8::try_from(i).unwrap());

        assert!(!boxed.is_inline());
        assert_eq!(*boxed, [0, 1]);
    }

    #[test]
    fn from_fn_panic_drops_created_elements() {
        let drops = Rc::new(Cell::new(0));

        let result = catch_unwind(AssertUnwindSafe(|| {
            SmallBox::<[Counted]>::from_fn(3, |i| {
                assert!(i < 2, "third element fails");
                Counted(Rc::clone(&drops))
            })
        }));

        assert!(result.is_err());
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn slice_default_and_uninit() {
        let zeros = SmallBox::<[u64]>::new_slice_default(3);
        assert_eq!(*zeros, [0, 0, 0]);

        let mut uninit = SmallBox::<[u8]>::new_uninit_slice(2);
        for element in uninit.iter_mut() {
            element.write(5);
        }

        // SAFETY: Initialized above.
        let slice = unsafe { uninit.assume_init() };
        assert!(slice.is_inline());
        assert_eq!(*slice, [5, 5]);
    }

    #[test]
    fn empty_slice_is_inline() {
        let empty = SmallBox::<[String]>::from_fn(0, |_| String::new());

        // An empty slice is still an owned object.
        assert!(empty.is_inline());
        assert!(!SmallBox::is_empty(&empty));
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn pinned_values_are_on_heap() {
        let pinned = SmallBox::<u8>::pin(1);

        assert_eq!(*pinned, 1);
    }
}
