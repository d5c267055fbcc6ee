//! Reference scanning: occurrence counting, extraction strategies, and
//! reference-site context resolution.

mod context;
mod counter;
mod references;
mod usage;

pub use context::{
    classify_script_reference, javascript_context, layout_object_context, menu_path,
    owning_base_table, owning_layout, owning_script, trigger_tag, TRIGGER_TAGS,
};
pub use counter::{OccurrenceCounter, MIN_COUNTED_NAME_LEN};
pub use references::{
    extract_chunk_field_refs, extract_dotted_refs, extract_embedded_field_refs,
    extract_field_id_refs, extract_js_script_calls, extract_merge_fields,
    extract_qualified_refs, extract_script_param_fields,
};
pub use usage::{format_grouped_locations, format_locations, SourceKind};
