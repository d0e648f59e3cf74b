//! Helper macros behind [`flex_layout!`](crate::flex_layout).
//!
//! Each helper dispatches on the slot kind keyword of one field.

/// Declare a header type whose arrays trail it in the same allocation.
///
/// ```text
/// flex_layout! {
///     #[derive(Debug)]
///     pub struct Name {
///         pub field: value(T),
///         pub field: array(T),
///         pub field: sized_array(T),
///         pub field: unsized_array(T),
///         pub field: adjacent(T),
///         pub field: sized_adjacent(T),
///         pub field: unsized_adjacent(T) after other_field,
///     }
/// }
/// ```
///
/// Generates:
///
/// - a `#[repr(C)]` struct with each value field as declared and each
///   array field as its descriptor type;
/// - an `unsafe impl FlexLayout` whose slot table is checked at compile
///   time;
/// - one associated [`Slot`](crate::arena::Slot) constant per array field,
///   named like the field, for the accessors on
///   [`FlexBox`](crate::arena::FlexBox);
/// - `build`, `build_in`, and `try_build_in` constructors taking one
///   argument per field in declaration order: the value for value fields,
///   the element count for array fields.
///
/// Array elements are default-constructed.
///
/// The generated struct already implements `Drop` (doing nothing), so it
/// cannot be given a `Drop` impl of its own: by the time the header is
/// dropped its array elements have been destroyed.
#[macro_export]
macro_rules! flex_layout {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $kind:ident ( $fty:ty ) $( after $anchor:ident )?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $fname: $crate::__flex_field_ty!($kind $fty),
            )*
        }

        // SAFETY: the table lists every field in order, with its
        // `offset_of!` offset and the exact field type.
        unsafe impl $crate::arena::FlexLayout for $name {
            const SLOTS: &'static [$crate::arena::SlotDecl] = &[
                $( $crate::__flex_slot_decl!($name, $fname, $kind $fty $(, $anchor)?), )*
            ];
        }

        const _: () = <$name as $crate::arena::FlexLayout>::LAYOUT_CHECK;

        // Array elements are gone by the time the header drops; a second
        // `Drop` impl for the header is a conflicting-impl error.
        impl ::core::ops::Drop for $name {
            fn drop(&mut self) {}
        }

        #[allow(dead_code)]
        impl $name {
            #[doc(hidden)]
            pub const __FLEX_NAMES: &'static [&'static str] = &[ $( ::core::stringify!($fname) ),* ];

            $( $crate::__flex_slot_const!($vis, $name, $fname, $kind $fty); )*

            /// Build with the global allocator.
            ///
            /// # Panics
            ///
            /// Panics if the block size overflows; allocation failure goes
            /// to `handle_alloc_error`.
            $vis fn build(
                $( $fname: $crate::__flex_arg_ty!($kind $fty) ),*
            ) -> $crate::arena::FlexBox<Self> {
                Self::build_in($crate::arena::Global, $( $fname ),*)
            }

            /// Build with `alloc`.
            ///
            /// # Panics
            ///
            /// As for `build`.
            $vis fn build_in<FlexAlloc: $crate::arena::RawAllocator>(
                alloc: FlexAlloc,
                $( $fname: $crate::__flex_arg_ty!($kind $fty) ),*
            ) -> $crate::arena::FlexBox<Self, FlexAlloc> {
                $crate::arena::FlexBox::unwrap_build(Self::try_build_in(
                    alloc,
                    &$crate::arena::BuildConfig::default(),
                    $( $fname ),*
                ))
            }

            /// Build with `alloc` under `config`, reporting failures.
            $vis fn try_build_in<FlexAlloc: $crate::arena::RawAllocator>(
                alloc: FlexAlloc,
                config: &$crate::arena::BuildConfig,
                $( $fname: $crate::__flex_arg_ty!($kind $fty) ),*
            ) -> ::core::result::Result<$crate::arena::FlexBox<Self, FlexAlloc>, $crate::arena::BuildError> {
                let requests = [ $( $crate::__flex_request!($kind $fname) ),* ];
                // SAFETY: every array field receives the descriptor of its
                // own slot, and descriptors only go into the header.
                unsafe {
                    $crate::arena::FlexBox::try_build_with(alloc, config, &requests, move |regions| Self {
                        $( $fname: $crate::__flex_field_init!(regions, $name, $kind $fname), )*
                    })
                }
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_field_ty {
    (value $t:ty) => { $t };
    (array $t:ty) => {
        <$crate::arena::Auto<$t, { ::core::mem::needs_drop::<$t>() }> as $crate::arena::AutoSelect>::Array
    };
    (sized_array $t:ty) => { $crate::arena::SizedArray<$t> };
    (unsized_array $t:ty) => { $crate::arena::UnsizedArray<$t> };
    (adjacent $t:ty) => {
        <$crate::arena::Auto<$t, { ::core::mem::needs_drop::<$t>() }> as $crate::arena::AutoSelect>::Adjacent
    };
    (sized_adjacent $t:ty) => { $crate::arena::SizedAdjacentArray<$t> };
    (unsized_adjacent $t:ty) => { $crate::arena::AdjacentArray<$t> };
    ($other:ident $t:ty) => {
        ::core::compile_error!(::core::concat!(
            "unknown slot kind `",
            ::core::stringify!($other),
            "`; expected value, array, sized_array, unsized_array, adjacent, sized_adjacent or unsized_adjacent"
        ))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_slot_decl {
    ($name:ident, $fname:ident, value $t:ty) => {
        $crate::arena::SlotDecl::value::<$t>(
            ::core::stringify!($fname),
            ::core::mem::offset_of!($name, $fname),
        )
    };
    ($name:ident, $fname:ident, value $t:ty, $anchor:ident) => {
        ::core::compile_error!("only adjacent arrays can follow another field")
    };
    ($name:ident, $fname:ident, $kind:ident $t:ty) => {
        $crate::arena::SlotDecl::array::<$crate::__flex_field_ty!($kind $t)>(
            ::core::stringify!($fname),
            ::core::mem::offset_of!($name, $fname),
            ::core::option::Option::None,
        )
    };
    ($name:ident, $fname:ident, $kind:ident $t:ty, $anchor:ident) => {
        $crate::arena::SlotDecl::array::<$crate::__flex_field_ty!($kind $t)>(
            ::core::stringify!($fname),
            ::core::mem::offset_of!($name, $fname),
            ::core::option::Option::Some($crate::arena::slot_index(
                $name::__FLEX_NAMES,
                ::core::stringify!($anchor),
            )),
        )
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_slot_const {
    ($vis:vis, $name:ident, $fname:ident, value $t:ty) => {};
    ($vis:vis, $name:ident, $fname:ident, $kind:ident $t:ty) => {
        #[doc = ::core::concat!("Slot token for the `", ::core::stringify!($fname), "` array.")]
        #[allow(non_upper_case_globals)]
        $vis const $fname: $crate::arena::Slot<$name, $crate::__flex_field_ty!($kind $t)> =
            // SAFETY: the index comes from the same field list as `SLOTS`,
            // whose entry for this field has exactly this descriptor type.
            unsafe {
                $crate::arena::Slot::new_unchecked($crate::arena::slot_index(
                    Self::__FLEX_NAMES,
                    ::core::stringify!($fname),
                ))
            };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_arg_ty {
    (value $t:ty) => { $t };
    ($kind:ident $t:ty) => { usize };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_request {
    (value $fname:ident) => {
        $crate::arena::SlotRequest::Value
    };
    ($kind:ident $fname:ident) => {
        $crate::arena::SlotRequest::Array($fname)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __flex_field_init {
    ($regions:ident, $name:ident, value $fname:ident) => {
        $fname
    };
    ($regions:ident, $name:ident, $kind:ident $fname:ident) => {
        $regions.descriptor({
            const INDEX: usize = $crate::arena::slot_index($name::__FLEX_NAMES, ::core::stringify!($fname));
            INDEX
        })
    };
}
