//! Tests for view conversions: unsizing casts, trait upcasting and downcasting.

use std::any::Any;
use std::thread;

use small_box::{
    Relocate, S24, S32, S64, SmallBox, SmallBoxCastAny, SmallPointee, VirtualHook,
    define_small_dyn,
};

trait Named {
    fn name(&self) -> String;
}

trait Greeter: Named {
    fn greet(&self) -> String {
        format!("hello from {}", self.name())
    }
}

define_small_dyn!(Named);
define_small_dyn!(Greeter);

trait Movable: Named + Relocate {
    fn steps(&self) -> usize;
}

define_small_dyn!(Movable: Relocate);

trait Sequence<T> {
    fn nth_item(&self, index: usize) -> Option<T>;
}

define_small_dyn!(Sequence<T>);

struct Robot {
    id: u32,
    steps: usize,
}

impl Named for Robot {
    fn name(&self) -> String {
        format!("robot {}", self.id)
    }
}

impl Greeter for Robot {}

impl Movable for Robot {
    fn steps(&self) -> usize {
        self.steps
    }
}

struct Evens;

impl Sequence<u64> for Evens {
    fn nth_item(&self, index: usize) -> Option<u64> {
        u64::try_from(index).ok().map(|index| index * 2)
    }
}

#[test]
fn unsizing_cast_keeps_object_inline() {
    let greeter = SmallBox::<Robot>::new(Robot { id: 1, steps: 0 }).cast_greeter();

    assert!(greeter.is_inline());
    assert_eq!(greeter.greet(), "hello from robot 1");
}

#[test]
fn upcast_preserves_dynamic_behavior() {
    let greeter = SmallBox::<Robot>::new(Robot { id: 2, steps: 0 }).cast_greeter();

    let named: SmallBox<dyn Named> = greeter.cast(|g| -> &mut dyn Named { g });

    assert!(named.is_inline());
    assert_eq!(named.name(), "robot 2");
}

#[test]
fn upcast_from_heap_keeps_address() {
    let greeter: SmallBox<dyn Greeter, S24> =
        SmallBox::new(Robot { id: 3, steps: 0 }).cast_greeter();
    assert!(!greeter.is_inline());

    let address = greeter.as_ptr().map(|p| p.cast::<u8>());
    let named: SmallBox<dyn Named, S24> = greeter.cast(|g| -> &mut dyn Named { g });

    assert_eq!(named.as_ptr().map(|p| p.cast::<u8>()), address);
    assert_eq!(named.name(), "robot 3");
}

#[test]
fn upcast_from_hook_view_to_callback_view() {
    let movable = SmallBox::<Robot>::new(Robot { id: 4, steps: 12 }).cast_movable();
    assert!(movable.is_inline());
    assert_eq!(movable.steps(), 12);

    // The hook view does not know the concrete type, so the callback view cannot keep the
    // object inline.
    let named: SmallBox<dyn Named> = movable.cast(|m| -> &mut dyn Named { m });

    assert!(!named.is_inline());
    assert_eq!(named.name(), "robot 4");
}

#[test]
fn callback_view_to_hook_view_stays_inline() {
    trait Inspect: Relocate {
        fn inspect(&self) -> String;
    }

    trait Source: Inspect {}

    impl SmallPointee for dyn Inspect {
        type Relocation = VirtualHook;
    }

    define_small_dyn!(Source);

    impl Inspect for Robot {
        fn inspect(&self) -> String {
            format!("{} after {} steps", self.name(), self.steps)
        }
    }

    impl Source for Robot {}

    let source = SmallBox::<Robot>::new(Robot { id: 5, steps: 3 }).cast_source();
    let inspect: SmallBox<dyn Inspect> = source.cast(|s| -> &mut dyn Inspect { s });

    assert!(inspect.is_inline());
    assert_eq!(inspect.inspect(), "robot 5 after 3 steps");
}

#[test]
fn generic_trait_view() {
    let sequence: SmallBox<dyn Sequence<u64>, S32> = SmallBox::new(Evens).cast_sequence();

    assert!(sequence.is_inline());
    assert_eq!(sequence.nth_item(21), Some(42));
}

#[test]
fn send_variants_of_registered_traits() {
    let named: SmallBox<dyn Named + Send + Sync> = SmallBox::<Robot>::new(Robot { id: 6, steps: 0 })
        .cast(|r| -> &mut (dyn Named + Send + Sync) { r });

    let handle = thread::spawn(move || named.name());

    assert_eq!(handle.join().unwrap(), "robot 6");
}

#[test]
fn any_downcast_round_trip() {
    let any: SmallBox<dyn Any, S64> = SmallBox::new(String::from("text")).cast_any();

    let any = any.downcast::<Vec<u8>>().unwrap_err();
    let text = any.downcast::<String>().unwrap();

    assert!(text.is_inline());
    assert_eq!(*text, "text");
}

#[test]
fn any_downcast_of_heap_object_keeps_allocation() {
    let any: SmallBox<dyn Any> = SmallBox::new([3_u64; 32]).cast_any();
    assert!(!any.is_inline());

    let address = any.as_ptr().map(|p| p.cast::<u8>());
    let array = any.downcast::<[u64; 32]>().unwrap();

    assert_eq!(array.as_ptr().map(|p| p.cast::<u8>()), address);
    assert_eq!(array[31], 3);
}

#[test]
fn cross_view_equality_is_identity() {
    let greeter = SmallBox::<Robot>::new(Robot { id: 7, steps: 0 }).cast_greeter();
    let other = SmallBox::<Robot>::new(Robot { id: 7, steps: 0 }).cast_greeter();

    assert!(greeter != other);
    assert!(SmallBox::<dyn Named>::empty() == SmallBox::<dyn Greeter, S32>::empty());
}
