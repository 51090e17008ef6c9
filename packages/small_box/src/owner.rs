use std::alloc::{self, Layout};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::ptr::{self, NonNull};

use tracing::trace;

use crate::storage::with_addr_of;
use crate::{Budget, RelocateFn, RelocationStrategy, S64, SmallPointee, Storage};

/// A move-only owning pointer that stores small objects inline.
///
/// Objects that fit the inline buffer of the [budget][Budget] `B` live inside the `SmallBox`
/// itself and need no allocation. Everything else is allocated on the heap, exactly like with a
/// [`Box`]. Either way, the `SmallBox` is the sole owner of the object and drops it when it is
/// itself dropped.
///
/// The owned type `T` may be a sized type, a slice or a trait object. Trait objects are owned
/// through views registered with [`define_small_dyn!`][crate::define_small_dyn], which also
/// decide how inline objects are relocated when they move between owners.
///
/// # Key Features
///
/// - **No allocation for small objects**: inline storage is sized by the budget type parameter
/// - **Transparent heap fallback**: oversized or over-aligned objects go to the heap
/// - **Trait objects**: store a concrete type inline and use it through a `dyn Trait` view
/// - **Relocation protocol**: swaps and view conversions move inline objects through the
///   strategy chosen for the view, including opt-in relocation hooks
/// - **Identity semantics**: comparison and hashing use the object address, like raw pointers
///
/// # Examples
///
/// ```rust
/// use small_box::{SmallBox, define_small_dyn};
///
/// pub trait Shape {
///     fn area(&self) -> f64;
/// }
///
/// define_small_dyn!(Shape);
///
/// struct Square(f64);
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.0 * self.0
///     }
/// }
///
/// let mut shape = SmallBox::<Square>::new(Square(3.0)).cast_shape();
/// assert!(shape.is_inline());
/// assert_eq!(shape.area(), 9.0);
///
/// // Moving out leaves the source empty.
/// let moved = shape.take();
/// assert!(shape.is_empty());
/// assert_eq!(moved.area(), 9.0);
/// ```
///
/// # Identity
///
/// Equality, ordering and hashing compare the address of the owned object. An inline object
/// lives inside the `SmallBox`, so its address changes every time the `SmallBox` itself moves.
/// A `SmallBox` holding an inline object is therefore not a stable key: moving it into a
/// [`HashSet`][std::collections::HashSet] or a [`BTreeSet`][std::collections::BTreeSet] (or
/// moving the collection's storage) changes its hash and ordering. Heap-backed objects keep
/// their address, and so their identity, for as long as they are owned.
///
/// # Thread safety
///
/// A `SmallBox<T>` is [`Send`] if `T` is [`Send`] and [`Sync`] if `T` is [`Sync`].
pub struct SmallBox<T: ?Sized + SmallPointee, B: Budget = S64> {
    storage: <T::Relocation as RelocationStrategy<T>>::Storage<B>,

    _owns: PhantomData<T>,
}

// SAFETY: The box owns its object exclusively, like `Box<T>`.
unsafe impl<T: ?Sized + SmallPointee + Send, B: Budget> Send for SmallBox<T, B> {}

// SAFETY: Shared access to the box only grants shared access to the object, like `Box<T>`.
unsafe impl<T: ?Sized + SmallPointee + Sync, B: Budget> Sync for SmallBox<T, B> {}

impl<T: ?Sized + SmallPointee, B: Budget> SmallBox<T, B> {
    pub(crate) const INLINE: bool =
        <<T::Relocation as RelocationStrategy<T>>::Storage<B> as Storage<T>>::INLINE;
    pub(crate) const CAPACITY: usize =
        <<T::Relocation as RelocationStrategy<T>>::Storage<B> as Storage<T>>::CAPACITY;
    pub(crate) const ALIGN: usize =
        <<T::Relocation as RelocationStrategy<T>>::Storage<B> as Storage<T>>::ALIGN;
    pub(crate) const NEEDS_CALLBACK: bool =
        <<T::Relocation as RelocationStrategy<T>>::Storage<B> as Storage<T>>::NEEDS_CALLBACK;

    /// Creates a `SmallBox` that owns nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let empty = SmallBox::<String>::empty();
    ///
    /// assert!(empty.is_empty());
    /// assert!(empty.get().is_none());
    /// ```
    #[must_use]
    pub fn empty() -> Self {
        Self {
            storage: <<T::Relocation as RelocationStrategy<T>>::Storage<B> as Storage<T>>::empty(),
            _owns: PhantomData,
        }
    }

    /// Whether the box owns nothing.
    ///
    /// A box that owns an empty slice is not empty. Use `len()` through the slice to check for
    /// elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Whether the owned object lives inside the box rather than on the heap.
    ///
    /// Always `false` for an empty box.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.storage.is_inline()
    }

    /// Number of inline bytes available to objects owned through this view.
    ///
    /// For sized types this is the size of the type if it fits, or zero if it is always
    /// allocated on the heap. For slices it is rounded down to whole elements. For trait objects
    /// it is the size of the whole buffer, to be compared against the concrete type.
    #[must_use]
    pub fn inline_capacity() -> usize {
        if Self::INLINE {
            <T::Relocation as RelocationStrategy<T>>::usable_capacity(Self::CAPACITY, Self::ALIGN)
        } else {
            0
        }
    }

    /// Whether an object reaching `extent` bytes into the buffer, with alignment `align`, can be
    /// stored inline by this view.
    pub(crate) fn fits(extent: usize, align: usize) -> bool {
        Self::INLINE && extent <= Self::CAPACITY && align <= Self::ALIGN
    }

    /// Start of the inline buffer.
    pub(crate) fn buffer(&self) -> NonNull<u8> {
        self.storage.buffer()
    }

    /// Takes ownership of a heap object. The box must be empty.
    pub(crate) fn adopt_heap(&mut self, heap: NonNull<T>) {
        debug_assert!(self.storage.is_empty());

        self.storage.set_heap(Some(heap));
    }

    /// Takes ownership of an object just written to the start of the inline buffer.
    ///
    /// # Safety
    ///
    /// The box must be empty and `view` must satisfy the contract of [`Storage::set_inline()`].
    pub(crate) unsafe fn adopt_inline(&mut self, view: NonNull<T>, relocate: Option<RelocateFn>) {
        debug_assert!(self.storage.is_empty());

        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.storage.set_inline(view, relocate);
        }
    }

    /// Returns a pointer to the owned object, or `None` if the box is empty.
    ///
    /// The pointer is only valid while the box is neither moved nor modified, since inline objects
    /// move together with the box.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.storage.as_ptr()
    }

    /// Returns a shared reference to the owned object, or `None` if the box is empty.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: The box owns a live object at this address and we hold a shared borrow of it.
        self.storage.as_ptr().map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns an exclusive reference to the owned object, or `None` if the box is empty.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: The box owns a live object at this address and we hold an exclusive borrow.
        self.storage.as_ptr().map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Destroys the owned object, leaving the box empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut boxed = SmallBox::<String>::new("gone".to_string());
    /// boxed.reset();
    ///
    /// assert!(boxed.is_empty());
    /// ```
    pub fn reset(&mut self) {
        self.install(None);
    }

    /// Destroys the owned object and takes ownership of a heap-allocated object instead.
    ///
    /// The new object is never moved into the inline buffer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut boxed = SmallBox::<u32>::new(1);
    /// boxed.reset_to(Box::new(2));
    ///
    /// assert_eq!(*boxed, 2);
    /// assert!(!boxed.is_inline());
    /// ```
    pub fn reset_to(&mut self, boxed: Box<T>) {
        self.install(Some(NonNull::from(Box::leak(boxed))));
    }

    /// Switches to the heap state and then destroys the previous object.
    ///
    /// The new state is installed first, so a panicking destructor cannot leave the box pointing
    /// at a destroyed object.
    fn install(&mut self, heap: Option<NonNull<T>>) {
        let previous = self.storage.as_ptr();
        let was_inline = self.storage.is_inline();

        // The inline bytes stay in place, only the bookkeeping forgets them.
        self.storage.set_heap(heap);

        if let Some(previous) = previous {
            // SAFETY: The storage owned this object until a moment ago and no longer refers to it.
            unsafe {
                destroy(previous, was_inline);
            }
        }
    }

    /// Moves the owned object into a new box, leaving this one empty.
    ///
    /// Inline objects are relocated with the strategy of the view.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut source = SmallBox::<Vec<u8>>::new(vec![1, 2, 3]);
    /// let target = source.take();
    ///
    /// assert!(source.is_empty());
    /// assert_eq!(*target, [1, 2, 3]);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        let mut taken = Self::empty();
        self.swap(&mut taken);
        taken
    }

    /// Exchanges the owned objects of two boxes.
    ///
    /// Heap-backed objects are exchanged by pointer. Inline objects are relocated between the
    /// buffers, through a temporary buffer if both objects are inline.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let mut small = SmallBox::<[u8]>::from_fn(4, |i| i as u8);
    /// let mut large = SmallBox::<[u8]>::from_fn(400, |_| 9);
    ///
    /// small.swap(&mut large);
    ///
    /// assert_eq!(small.len(), 400);
    /// assert_eq!(*large, [0, 1, 2, 3]);
    /// assert!(large.is_inline());
    /// ```
    pub fn swap(&mut self, other: &mut Self) {
        match (self.storage.is_inline(), other.storage.is_inline()) {
            (false, false) => mem::swap(&mut self.storage, &mut other.storage),
            (true, true) => {
                let mut temp = Self::empty();

                // SAFETY: Each source holds an inline object at the time of the call and each
                // target is empty, with all three being the same storage type.
                unsafe {
                    relocate_within::<T, _>(&mut other.storage, &mut temp.storage);
                }
                // SAFETY: As above.
                unsafe {
                    relocate_within::<T, _>(&mut self.storage, &mut other.storage);
                }
                // SAFETY: As above.
                unsafe {
                    relocate_within::<T, _>(&mut temp.storage, &mut self.storage);
                }
            }
            (true, false) => {
                let heap = other.storage.as_ptr();
                other.storage.set_heap(None);

                // SAFETY: `self` holds an inline object and `other` was just emptied.
                unsafe {
                    relocate_within::<T, _>(&mut self.storage, &mut other.storage);
                }

                self.storage.set_heap(heap);
            }
            (false, true) => other.swap(self),
        }
    }

    /// Converts the box into a box of a different view of the same object.
    ///
    /// The conversion function receives the owned object and must return a reference to the
    /// same object, typically an unsizing coercion (`value as &mut dyn Trait`) or a trait
    /// upcast (`value as &mut dyn Supertrait`). Inline objects stay inline if the new view can
    /// store them, otherwise they are moved to the heap.
    ///
    /// An empty box converts into an empty box without calling `f`.
    ///
    /// # Panics
    ///
    /// Panics if the returned reference does not point to the same object (same address, size
    /// and alignment).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{SmallBox, define_small_dyn};
    ///
    /// pub trait Named {
    ///     fn name(&self) -> &str;
    /// }
    ///
    /// pub trait Tool: Named {
    ///     fn run(&mut self) -> u32;
    /// }
    ///
    /// define_small_dyn!(Named);
    /// define_small_dyn!(Tool);
    ///
    /// struct Hammer(u32);
    ///
    /// impl Named for Hammer {
    ///     fn name(&self) -> &str {
    ///         "hammer"
    ///     }
    /// }
    ///
    /// impl Tool for Hammer {
    ///     fn run(&mut self) -> u32 {
    ///         self.0 += 1;
    ///         self.0
    ///     }
    /// }
    ///
    /// let mut tool: SmallBox<dyn Tool> =
    ///     SmallBox::<Hammer>::new(Hammer(0)).cast(|t| t as &mut dyn Tool);
    /// assert_eq!(tool.run(), 1);
    ///
    /// // Upcasting to a supertrait view keeps the object and its state.
    /// let named: SmallBox<dyn Named> = tool.cast(|t| t as &mut dyn Named);
    /// assert_eq!(named.name(), "hammer");
    /// ```
    #[must_use]
    pub fn cast<U>(self, f: impl FnOnce(&mut T) -> &mut U) -> SmallBox<U, B>
    where
        U: ?Sized + SmallPointee,
    {
        self.transfer(|mut ptr| {
            // SAFETY: `transfer()` only calls us with the live owned object.
            let source = unsafe { ptr.as_mut() };
            let source_layout = Layout::for_value(source);
            let source_addr = ptr.cast::<u8>();

            let target = NonNull::from(f(source));

            // SAFETY: The reference returned by `f` is valid for the duration of this call.
            let target_layout = Layout::for_value(unsafe { target.as_ref() });

            assert!(
                target.cast::<u8>() == source_addr && target_layout == source_layout,
                "SmallBox view conversion must return a reference to the same object"
            );

            target
        })
    }

    /// Moves the owned object into a box with a different budget.
    ///
    /// The object is stored inline in the new box if it fits there, otherwise on the heap.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{S24, S128, SmallBox};
    ///
    /// let large = SmallBox::<[u64; 4], S128>::new([1, 2, 3, 4]);
    /// assert!(large.is_inline());
    ///
    /// let small = large.with_budget::<S24>();
    /// assert!(!small.is_inline());
    /// assert_eq!(*small, [1, 2, 3, 4]);
    /// ```
    #[must_use]
    pub fn with_budget<B2: Budget>(self) -> SmallBox<T, B2> {
        self.transfer(|ptr| ptr)
    }

    /// Moves the owned object into a box of view `U` and budget `B2`.
    ///
    /// `view` receives the owned object and must return a pointer to the same object at the
    /// same address. It is called before any state changes, so a panic in it leaves `self`
    /// intact.
    pub(crate) fn transfer<U, B2>(
        mut self,
        view: impl FnOnce(NonNull<T>) -> NonNull<U>,
    ) -> SmallBox<U, B2>
    where
        U: ?Sized + SmallPointee,
        B2: Budget,
    {
        let mut target = SmallBox::<U, B2>::empty();

        let Some(source) = self.storage.as_ptr() else {
            return target;
        };

        let converted = view(source);

        if !self.storage.is_inline() {
            self.storage.set_heap(None);
            target.storage.set_heap(Some(converted));
            return target;
        }

        // SAFETY: The box owns a live object at this address.
        let layout = Layout::for_value(unsafe { source.as_ref() });
        let relocate = self.storage.relocate_fn();

        let fits = SmallBox::<U, B2>::fits(layout.size(), layout.align())
            && (relocate.is_some() || !SmallBox::<U, B2>::NEEDS_CALLBACK);

        if fits {
            let destination = target.storage.buffer();

            // SAFETY: The source holds this inline object, which fits the empty target buffer.
            unsafe {
                <T::Relocation as RelocationStrategy<T>>::relocate(
                    source,
                    self.storage.buffer(),
                    destination,
                    relocate,
                );
            }

            self.storage.set_heap(None);

            // SAFETY: The relocated object starts at the target buffer and the callback, if the
            // target needs one, was created for its concrete type.
            unsafe {
                target.storage.set_inline(with_addr_of(converted, destination), relocate);
            }
        } else {
            trace!(
                size = layout.size(),
                align = layout.align(),
                capacity = SmallBox::<U, B2>::CAPACITY,
                "inline object does not fit the target storage, moving it to the heap"
            );

            // SAFETY: The source holds this inline object.
            let heap = unsafe { self.relocate_to_heap(source) };
            target.storage.set_heap(Some(with_addr_of(converted, heap.cast())));
        }

        target
    }

    /// Moves the inline object into a new heap allocation, leaving the box empty.
    ///
    /// # Safety
    ///
    /// `source` must be the pointer to the inline object currently owned by the box.
    unsafe fn relocate_to_heap(&mut self, source: NonNull<T>) -> NonNull<T> {
        // SAFETY: Forwarding the caller's guarantee that the object is live.
        let layout = Layout::for_value(unsafe { source.as_ref() });
        let heap = allocate(layout);

        // SAFETY: The storage holds this inline object and the allocation fits its layout.
        unsafe {
            <T::Relocation as RelocationStrategy<T>>::relocate(
                source,
                self.storage.buffer(),
                heap,
                self.storage.relocate_fn(),
            );
        }

        self.storage.set_heap(None);

        with_addr_of(source, heap)
    }

    /// Moves the owned object to the heap, unless it is there already, and returns it as a [`Box`].
    ///
    /// This is the counterpart of releasing ownership: an inline object cannot be released as a
    /// raw pointer because it lives inside the box.
    ///
    /// # Panics
    ///
    /// Panics if the box is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let boxed = SmallBox::<u32>::new(5);
    /// assert!(boxed.is_inline());
    ///
    /// let regular: Box<u32> = boxed.into_box();
    /// assert_eq!(*regular, 5);
    /// ```
    #[must_use]
    pub fn into_box(mut self) -> Box<T> {
        let heap = self.take_heap();

        // SAFETY: The pointer comes from `Box` or from an allocation with the layout of the
        // object, and the box no longer refers to it.
        unsafe { Box::from_raw(heap.as_ptr()) }
    }

    /// Pins the owned object, moving it to the heap first if it is inline.
    ///
    /// Inline objects move whenever the box moves, so only heap-backed objects can be pinned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::SmallBox;
    ///
    /// let pinned = SmallBox::<u32>::new(5).into_pin();
    ///
    /// assert_eq!(*pinned, 5);
    /// ```
    #[must_use]
    pub fn into_pin(mut self) -> Pin<Self> {
        if self.storage.is_inline() {
            let heap = self.take_heap();
            self.storage.set_heap(Some(heap));
        }

        // SAFETY: The object is on the heap (or absent) and never returns to the inline buffer,
        // since every relocating operation requires `&mut Self`, which `Pin` does not hand out.
        unsafe { Pin::new_unchecked(self) }
    }

    /// Detaches the owned object as a heap pointer, relocating it first if inline.
    fn take_heap(&mut self) -> NonNull<T> {
        let Some(source) = self.storage.as_ptr() else {
            panic!("cannot move the object out of an empty SmallBox");
        };

        if self.storage.is_inline() {
            trace!("moving inline object to the heap");

            // SAFETY: The storage holds this inline object.
            unsafe { self.relocate_to_heap(source) }
        } else {
            self.storage.set_heap(None);
            source
        }
    }

    /// The address of the owned object, null for an empty box.
    fn thin_ptr(&self) -> *const u8 {
        self.storage
            .as_ptr()
            .map_or(ptr::null(), |ptr| ptr.cast::<u8>().as_ptr().cast_const())
    }
}

impl<T, B: Budget> SmallBox<T, B> {
    /// Whether objects of type `T` never fit the inline buffer of budget `B`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{S32, SmallBox};
    ///
    /// assert!(!SmallBox::<u64, S32>::is_always_heap_allocated());
    /// assert!(SmallBox::<[u64; 8], S32>::is_always_heap_allocated());
    /// ```
    #[must_use]
    pub fn is_always_heap_allocated() -> bool {
        !Self::fits(size_of::<T>(), align_of::<T>())
    }

    /// Moves the owned object out of the box.
    ///
    /// # Panics
    ///
    /// Panics if the box is empty.
    #[must_use]
    pub fn into_inner(mut self) -> T {
        let Some(source) = self.storage.as_ptr() else {
            panic!("cannot move the object out of an empty SmallBox");
        };

        if self.storage.is_inline() {
            self.storage.set_heap(None);

            // SAFETY: The storage no longer refers to the object, so reading it out is a move.
            unsafe { source.read() }
        } else {
            self.storage.set_heap(None);

            // SAFETY: The pointer came from `Box<T>` and the box no longer refers to it.
            let boxed = unsafe { Box::from_raw(source.as_ptr()) };
            *boxed
        }
    }
}

impl<E, B: Budget> SmallBox<[E], B> {
    /// Number of elements that fit the inline buffer.
    ///
    /// Slices with more elements are allocated on the heap. Zero-sized elements always fit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use small_box::{S64, SmallBox};
    ///
    /// let capacity = SmallBox::<[u16], S64>::inline_array_capacity();
    /// assert_eq!(capacity, (64 - 2 * size_of::<usize>()) / 2);
    /// ```
    #[must_use]
    pub fn inline_array_capacity() -> usize {
        if !Self::INLINE || align_of::<E>() > Self::ALIGN {
            return 0;
        }

        Self::CAPACITY.checked_div(size_of::<E>()).unwrap_or(usize::MAX)
    }
}

macro_rules! impl_any_downcast {
    ($($view:ty),*) => {$(
        impl<B: Budget> SmallBox<$view, B> {
            /// Converts the box into a box of the concrete type, if the object is of that type.
            ///
            /// The object stays inline if it was inline. On failure, the box is returned as is.
            ///
            /// # Examples
            ///
            /// ```rust
            /// use std::any::Any;
            ///
            /// use small_box::{SmallBox, SmallBoxCastAny};
            ///
            /// let any: SmallBox<dyn Any> = SmallBox::new(7_u8).cast_any();
            ///
            /// let any = any.downcast::<u16>().unwrap_err();
            /// let value = any.downcast::<u8>().unwrap();
            /// assert_eq!(*value, 7);
            /// ```
            pub fn downcast<U: Any>(self) -> Result<SmallBox<U, B>, Self> {
                if self.get().is_some_and(|value| value.is::<U>()) {
                    Ok(self.transfer(NonNull::cast::<U>))
                } else {
                    Err(self)
                }
            }
        }
    )*};
}

impl_any_downcast!(dyn Any, dyn Any + Send, dyn Any + Send + Sync);

/// Moves the inline object of `source` into the buffer of `target`, leaving `source` empty.
///
/// # Safety
///
/// `source` must hold an inline object and `target` must be empty.
unsafe fn relocate_within<T, S>(source: &mut S, target: &mut S)
where
    T: ?Sized + SmallPointee,
    S: Storage<T>,
{
    let Some(view) = source.as_ptr() else {
        return;
    };

    let relocate = source.relocate_fn();
    let destination = target.buffer();

    // SAFETY: Both storages have the same layout, so the object fits the target buffer.
    unsafe {
        <T::Relocation as RelocationStrategy<T>>::relocate(
            view,
            source.buffer(),
            destination,
            relocate,
        );
    }

    source.set_heap(None);

    // SAFETY: The object now lives at the start of the target buffer, with the same callback.
    unsafe {
        target.set_inline(with_addr_of(view, destination), relocate);
    }
}

/// Destroys an object that was owned by a `SmallBox`.
///
/// # Safety
///
/// `ptr` must point to a live object no longer referenced by any storage. If `inline` is false,
/// it must have been allocated like a `Box<T>`.
unsafe fn destroy<T: ?Sized>(ptr: NonNull<T>, inline: bool) {
    if inline {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            ptr::drop_in_place(ptr.as_ptr());
        }
    } else {
        // SAFETY: Forwarding the caller's guarantees.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

/// Allocates memory for `layout` the way `Box` does, including for zero-sized layouts.
fn allocate(layout: Layout) -> NonNull<u8> {
    if layout.size() == 0 {
        // Zero-sized objects need an aligned address, not memory.
        return NonNull::new(ptr::without_provenance_mut(layout.align()))
            .unwrap_or_else(|| alloc::handle_alloc_error(layout));
    }

    // SAFETY: The layout has a nonzero size.
    let ptr = unsafe { alloc::alloc(layout) };

    NonNull::new(ptr).unwrap_or_else(|| alloc::handle_alloc_error(layout))
}

impl<T: ?Sized + SmallPointee, B: Budget> Drop for SmallBox<T, B> {
    fn drop(&mut self) {
        if let Some(ptr) = self.storage.as_ptr() {
            // SAFETY: The box owns the object and is going away.
            unsafe {
                destroy(ptr, self.storage.is_inline());
            }
        }
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> Default for SmallBox<T, B> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> Deref for SmallBox<T, B> {
    type Target = T;

    fn deref(&self) -> &T {
        let Some(value) = self.get() else {
            panic!("dereferenced an empty SmallBox");
        };

        value
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> DerefMut for SmallBox<T, B> {
    fn deref_mut(&mut self) -> &mut T {
        let Some(value) = self.get_mut() else {
            panic!("dereferenced an empty SmallBox");
        };

        value
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> AsRef<T> for SmallBox<T, B> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> AsMut<T> for SmallBox<T, B> {
    fn as_mut(&mut self) -> &mut T {
        self
    }
}

/// Compares object addresses. The address of an inline object changes when the box moves, see
/// [Identity](SmallBox#identity).
impl<T, U, B, B2> PartialEq<SmallBox<U, B2>> for SmallBox<T, B>
where
    T: ?Sized + SmallPointee,
    U: ?Sized + SmallPointee,
    B: Budget,
    B2: Budget,
{
    fn eq(&self, other: &SmallBox<U, B2>) -> bool {
        self.thin_ptr() == other.thin_ptr()
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> Eq for SmallBox<T, B> {}

impl<T, U, B, B2> PartialOrd<SmallBox<U, B2>> for SmallBox<T, B>
where
    T: ?Sized + SmallPointee,
    U: ?Sized + SmallPointee,
    B: Budget,
    B2: Budget,
{
    fn partial_cmp(&self, other: &SmallBox<U, B2>) -> Option<Ordering> {
        Some(self.thin_ptr().cmp(&other.thin_ptr()))
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> Ord for SmallBox<T, B> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.thin_ptr().cmp(&other.thin_ptr())
    }
}

/// Hashes the object address. A box holding an inline object hashes differently after every
/// move, so it must not be used as a key in hashed collections. See
/// [Identity](SmallBox#identity).
impl<T: ?Sized + SmallPointee, B: Budget> Hash for SmallBox<T, B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.thin_ptr().hash(state);
    }
}

impl<T: ?Sized + SmallPointee + fmt::Debug, B: Budget> fmt::Debug for SmallBox<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized + SmallPointee + fmt::Display, B: Budget> fmt::Display for SmallBox<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized + SmallPointee, B: Budget> fmt::Pointer for SmallBox<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.thin_ptr(), f)
    }
}
