// crates/form-engine-core/src/core/mod.rs
// ============================================================================
// Module: Form Engine Core Types
// Description: Form definition model, identifiers, data tree, and hashing.
// Purpose: Provide stable, serializable types shared by the runtime.
// Dependencies: form-logic, serde
// ============================================================================

//! ## Overview
//! Core types define the serializable form definition, path and handle
//! identifiers, the instance data tree, and canonical definition hashing.
//! They carry no evaluation logic.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod definition;
pub mod hashing;
pub mod identifiers;
pub mod tree;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use definition::BindDef;
pub use definition::BindingSlot;
pub use definition::ChoiceDef;
pub use definition::EngineLimits;
pub use definition::FieldDef;
pub use definition::FieldKind;
pub use definition::FormDef;
pub use definition::FormDefinitionError;
pub use definition::GroupAppearance;
pub use definition::GroupDef;
pub use definition::NodeDef;
pub use definition::RepeatDef;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::BindingId;
pub use identifiers::FieldPath;
pub use identifiers::FieldPathError;
pub use identifiers::FormId;
pub use identifiers::NodeId;
pub use identifiers::PathSegment;
pub use identifiers::ScreenId;
pub use tree::DataTree;
pub use tree::NodeKind;
pub use tree::TreeNode;
