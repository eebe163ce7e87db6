// Request/response contracts and the predict handler
pub mod api;

// Bar loading for the command-line front end
pub mod bar_files;
