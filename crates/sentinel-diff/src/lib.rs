pub mod diff;
pub mod event_id;
pub mod payload_limiter;
pub mod stable_json;

pub use diff::{
    approx_change_ratio, compute_fields_change, compute_text_change, diff_json,
    remove_ignored_json_paths,
};
pub use event_id::{idempotent_event_id, per_run_event_id};
pub use payload_limiter::limit_payload;
