pub mod id;
pub mod record_router;
