//! The standard rewrite passes, in pipeline order

mod autobox;
mod enhanced_for;
mod inner_class;
mod lowering;
mod method_ref;
mod nil_check;
mod outer_reference;
mod sequencing;
mod static_init;
mod switch;
mod type_order;
mod unsupported;

pub use autobox::Autoboxing;
pub use enhanced_for::EnhancedForDesugaring;
pub use inner_class::InnerTypeExtraction;
pub use lowering::ArrayOperatorLowering;
pub use method_ref::MethodReferenceLowering;
pub use nil_check::NilCheckInsertion;
pub use outer_reference::{OuterReferenceResolution, OUTER_FIELD_NAME};
pub use sequencing::SequencingExtraction;
pub use static_init::{StaticInitNormalization, STATIC_INIT_FLAG_NAME, STATIC_INIT_NAME};
pub use switch::SwitchLowering;
pub use type_order::TypeOrdering;
pub use unsupported::UnsupportedConstructCheck;
