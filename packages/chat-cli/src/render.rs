//! Transcript rendering.

use agent_chat::{Message, Role};
use colored::{ColoredString, Colorize};

pub fn role_label(role: Role) -> ColoredString {
    match role {
        Role::User => "you".bright_green().bold(),
        Role::Assistant => "agent".bright_cyan().bold(),
    }
}

/// Header printed before a message body: `[HH:MM] role>`.
pub fn message_prefix(message: &Message) -> String {
    format!(
        "{} {} ",
        format!("[{}]", message.display_time()).dimmed(),
        format!("{}>", role_label(message.role)),
    )
}

pub fn print_message(message: &Message) {
    println!("{}{}", message_prefix(message), message.content);
}

pub fn print_error(error: &str) {
    println!("{} {}", "error:".bright_red().bold(), error.red());
}

pub fn print_notice(notice: &str) {
    println!("{}", notice.yellow());
}

pub fn print_banner(title: &str, persona: &str) {
    println!();
    println!("{}", "╔════════════════════════════════════════╗".bright_cyan());
    println!("{}", format!("  {}", title).bright_cyan().bold());
    println!("{}", "╚════════════════════════════════════════╝".bright_cyan());
    println!("{}", persona.dimmed());
    println!(
        "{}",
        "Type a message and press Enter. Ctrl-C stops a reply, /quit exits.".dimmed()
    );
    println!();
}
