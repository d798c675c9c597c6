pub mod add;
pub mod delete;
pub mod done;
pub mod edit;
pub mod list;
pub mod member;
pub mod show;
pub mod status;
