/// Registers a trait for use as a [`SmallBox`][crate::SmallBox] trait object view.
///
/// The macro implements [`SmallPointee`][crate::SmallPointee] for `dyn Trait`,
/// `dyn Trait + Send` and `dyn Trait + Send + Sync`, and generates an extension trait named
/// `SmallBoxCast<Trait>` with a `cast_<trait>()` method that converts a `SmallBox` of a concrete
/// type into a `SmallBox<dyn Trait>`.
///
/// * `define_small_dyn!(Trait)` relocates inline objects through a stored callback.
/// * `define_small_dyn!(Trait: Relocate)` relocates inline objects through
///   [`Relocate::relocate_to()`][crate::Relocate::relocate_to], dispatched via the vtable. The
///   trait must have [`Relocate`][crate::Relocate] as a supertrait.
///
/// Traits with type parameters are supported, the parameters become parameters of the extension
/// trait: `define_small_dyn!(Producer<T>)`.
///
/// # Examples
///
/// ```rust
/// use small_box::{Relocate, SmallBox, define_small_dyn};
///
/// pub trait Label {
///     fn label(&self) -> String;
/// }
///
/// pub trait Job: Relocate {
///     fn run(&mut self) -> usize;
/// }
///
/// define_small_dyn!(Label);
/// define_small_dyn!(Job: Relocate);
///
/// impl Label for u32 {
///     fn label(&self) -> String {
///         format!("#{self}")
///     }
/// }
///
/// impl Job for Vec<u8> {
///     fn run(&mut self) -> usize {
///         self.push(0);
///         self.len()
///     }
/// }
///
/// let label = SmallBox::<u32>::new(42).cast_label();
/// assert!(label.is_inline());
/// assert_eq!(label.label(), "#42");
///
/// let mut job = SmallBox::<Vec<u8>>::new(vec![1]).cast_job();
/// assert_eq!(job.run(), 2);
/// ```
///
/// The registered trait must be defined in the crate that invokes the macro.
#[macro_export]
macro_rules! define_small_dyn {
    (@impl $strategy:path, $trait_name:ident $(<$($param:ident),+>)?) => {
        impl$(<$($param),+>)? $crate::SmallPointee for dyn $trait_name$(<$($param),+>)? {
            type Relocation = $strategy;
        }

        impl$(<$($param),+>)? $crate::SmallPointee for dyn $trait_name$(<$($param),+>)? + Send {
            type Relocation = $strategy;
        }

        impl$(<$($param),+>)? $crate::SmallPointee
            for dyn $trait_name$(<$($param),+>)? + Send + Sync
        {
            type Relocation = $strategy;
        }

        $crate::__private::paste::paste! {
            #[doc = concat!(
                "Converts a `SmallBox` of a concrete type into a `SmallBox<dyn ",
                stringify!($trait_name),
                ">`."
            )]
            pub trait [<SmallBoxCast $trait_name>]<$($($param,)+)? __B: $crate::Budget> {
                #[doc = concat!(
                    "Converts the box into a `SmallBox<dyn ",
                    stringify!($trait_name),
                    ">`, keeping the object inline if it fits."
                )]
                #[must_use]
                fn [<cast_ $trait_name:snake>](
                    self,
                ) -> $crate::SmallBox<dyn $trait_name$(<$($param),+>)?, __B>;
            }

            impl<__T, $($($param,)+)? __B> [<SmallBoxCast $trait_name>]<$($($param,)+)? __B>
                for $crate::SmallBox<__T, __B>
            where
                __T: $trait_name$(<$($param),+>)? + 'static,
                __B: $crate::Budget,
            {
                fn [<cast_ $trait_name:snake>](
                    self,
                ) -> $crate::SmallBox<dyn $trait_name$(<$($param),+>)?, __B> {
                    self.cast(|value| -> &mut dyn $trait_name$(<$($param),+>)? { value })
                }
            }
        }
    };
    ($trait_name:ident $(<$($param:ident),+>)? : Relocate) => {
        $crate::define_small_dyn!(
            @impl $crate::VirtualHook, $trait_name$(<$($param),+>)?
        );
    };
    ($trait_name:ident $(<$($param:ident),+>)?) => {
        $crate::define_small_dyn!(
            @impl $crate::Callback, $trait_name$(<$($param),+>)?
        );
    };
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Display;

    use crate::{Relocate, S32, SmallBox};

    trait Producer<T> {
        fn produce(&self) -> T;
    }

    struct Constant(u64);

    impl Producer<u64> for Constant {
        fn produce(&self) -> u64 {
            self.0
        }
    }

    define_small_dyn!(Producer<T>);

    trait Counter: Relocate {
        fn count(&self) -> usize;
    }

    struct Fixed(usize);

    impl Counter for Fixed {
        fn count(&self) -> usize {
            self.0
        }
    }

    define_small_dyn!(Counter: Relocate);

    define_small_dyn!(Display);

    #[test]
    fn generic_trait_cast() {
        let producer: SmallBox<dyn Producer<u64>> =
            SmallBox::<Constant>::new(Constant(5)).cast_producer();

        assert!(producer.is_inline());
        assert_eq!(producer.produce(), 5);
    }

    #[test]
    fn hook_trait_cast_keeps_budget() {
        let counter = SmallBox::<_, S32>::new(Fixed(3)).cast_counter();

        assert!(counter.is_inline());
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn plain_trait_cast() {
        let shown = SmallBox::<&str>::new("text").cast_display();

        assert_eq!(shown.to_string(), "text");
    }
}
