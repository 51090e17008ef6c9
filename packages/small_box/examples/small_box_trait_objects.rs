//! Trait object usage with `SmallBox`.
//!
//! This example demonstrates:
//! * Registering traits with `define_small_dyn!`
//! * Upcasting a trait object to its supertrait
//! * Swapping inline and heap-backed trait objects
//! * Downcasting from `dyn Any`

use std::any::Any;

use small_box::{SmallBox, SmallBoxCastAny, define_small_dyn};

trait Animal {
    fn name(&self) -> &str;
}

trait Pet: Animal {
    fn speak(&self) -> String;
}

define_small_dyn!(Animal);
define_small_dyn!(Pet);

struct Dog {
    name: String,
}

impl Animal for Dog {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Pet for Dog {
    fn speak(&self) -> String {
        format!("{} says woof", self.name)
    }
}

/// A pet with a lot of state, too large to be stored inline.
struct Parrot {
    name: String,
    vocabulary: [&'static str; 8],
}

impl Animal for Parrot {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Pet for Parrot {
    fn speak(&self) -> String {
        format!("{} says {}", self.name, self.vocabulary.join(" "))
    }
}

fn describe(label: &str, pet: &SmallBox<dyn Pet>) {
    println!("{label}: {} (inline: {})", pet.speak(), pet.is_inline());
}

fn main() {
    println!("Example 1: Pet trait objects");
    println!("----------------------------");

    let mut dog: SmallBox<dyn Pet> = SmallBox::new(Dog {
        name: "Rex".to_string(),
    })
    .cast_pet();
    let mut parrot: SmallBox<dyn Pet> = SmallBox::new(Parrot {
        name: "Polly".to_string(),
        vocabulary: ["hello"; 8],
    })
    .cast_pet();

    describe("dog", &dog);
    describe("parrot", &parrot);

    println!();
    println!("Example 2: swapping inline and heap objects");
    println!("-------------------------------------------");

    dog.swap(&mut parrot);
    describe("first", &dog);
    describe("second", &parrot);

    println!();
    println!("Example 3: upcasting to the supertrait");
    println!("--------------------------------------");

    let animal: SmallBox<dyn Animal> = parrot.cast(|pet| -> &mut dyn Animal { pet });
    println!("animal name: {} (inline: {})", animal.name(), animal.is_inline());

    println!();
    println!("Example 4: downcasting from dyn Any");
    println!("-----------------------------------");

    let any: SmallBox<dyn Any> = SmallBox::new(7_u32).cast_any();
    match any.downcast::<u32>() {
        Ok(number) => println!("found a u32: {}", *number),
        Err(other) => println!("not a u32, still inline: {}", other.is_inline()),
    }
}
