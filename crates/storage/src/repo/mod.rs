mod commands;
mod flairs;
