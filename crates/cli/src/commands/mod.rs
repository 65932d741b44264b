pub mod config;
pub mod doctor;
pub mod run;

pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}
