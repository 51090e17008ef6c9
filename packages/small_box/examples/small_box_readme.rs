//! Example that demonstrates the exact usage shown in the README.md file.
//!
//! This shows how `SmallBox` keeps small objects inline and falls back to the heap for large ones.

use small_box::{S32, SmallBox, define_small_dyn};

pub trait Shape {
    fn area(&self) -> f64;
}

define_small_dyn!(Shape);

struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

struct Polygon {
    points: [(f64, f64); 16],
}

impl Shape for Polygon {
    fn area(&self) -> f64 {
        let doubled: f64 = self
            .points
            .iter()
            .zip(self.points.iter().cycle().skip(1))
            .map(|((x1, y1), (x2, y2))| x1 * y2 - x2 * y1)
            .sum();

        doubled.abs() / 2.0
    }
}

fn main() {
    println!("=== SmallBox README Example ===");

    // A small value lives inside the SmallBox, no allocation needed.
    let number = SmallBox::<u64, S32>::new(42);
    assert!(number.is_inline());
    println!("Inline value: {}", *number);

    // Trait objects keep small concrete types inline too.
    let mut shapes: Vec<SmallBox<dyn Shape>> = vec![
        SmallBox::new(Circle { radius: 1.0 }).cast_shape(),
        SmallBox::new(Polygon {
            points: [(0.0, 0.0); 16],
        })
        .cast_shape(),
    ];

    for shape in &shapes {
        println!("Area {:.2}, inline: {}", shape.area(), shape.is_inline());
    }

    // Ownership moves out, leaving an empty SmallBox behind.
    let circle = shapes[0].take();
    assert!(shapes[0].is_empty());
    println!("Moved circle area: {:.2}", circle.area());

    println!("README example completed successfully!");
}
