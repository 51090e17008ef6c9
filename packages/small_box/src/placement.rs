/// Determines where a factory places a newly created object.
///
/// By default, objects are stored inline whenever they fit.
///
/// # Examples
///
/// ```
/// use small_box::{Placement, SmallBox};
///
/// let inline = SmallBox::<u32>::new_in(7, Placement::Auto);
/// let heap = SmallBox::<u32>::new_in(7, Placement::Heap);
///
/// assert!(inline.is_inline());
/// assert!(!heap.is_inline());
/// assert_eq!(*inline, *heap);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum Placement {
    /// The object is stored inline if its size and alignment fit the inline buffer, otherwise it
    /// is allocated on the heap. This is the default.
    #[default]
    Auto,

    /// The object is always allocated on the heap.
    ///
    /// Owners created this way behave exactly like inline ones, apart from never reporting
    /// [`is_inline()`][crate::SmallBox::is_inline]. This may be valuable when the object must
    /// not move for its entire lifetime, or to compare behavior against heap storage.
    Heap,
}
