pub mod fact;
pub mod record;
