pub mod sanitization_helpers;
