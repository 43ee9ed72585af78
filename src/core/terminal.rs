use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// Colored status word for execution, agent and ingestion states.
pub fn styled_status(status: &str) -> String {
    match status {
        "completed" | "active" | "success" => style(status).green().to_string(),
        "failed" | "error" => style(status).red().bold().to_string(),
        "running" | "processing" => style(status).yellow().to_string(),
        _ => style(status).dim().to_string(),
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        "                          _      _           _    ",
        "   __ _  __ _  ___ _ __ | |_ __| | ___  ___| | __",
        "  / _` |/ _` |/ _ \\ '_ \\| __/ _` |/ _ \\/ __| |/ /",
        " | (_| | (_| |  __/ | | | || (_| |  __/ (__|   < ",
        "  \\__,_|\\__, |\\___|_| |_|\\__\\__,_|\\___|\\___|_|\\_\\",
        "        |___/                                    ",
    ];

    // Gradient: #3b82f6 → #10b981 (diagonal top-left → bottom-right)
    let stops: [(u8, u8, u8); 2] = [(59, 130, 246), (16, 185, 129)];
    let max_w = 50u32;
    let max_d = max_w + 5 * 10;

    println!();
    for (y, line) in lines.iter().enumerate() {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let t = ((x as u32 + y as u32 * 10) * 1000 / max_d).min(1000);
            let (r, g, b) = lerp_color(stops[0], stops[1], t);
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;16;185;129mSchedule, run and watch your agents.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

pub fn print_goodbye() {
    println!(
        "\n{} {}",
        SPARKLE,
        style("agentdeck stopped. See you next time!").bold().cyan()
    );
}

enum GuideLine {
    Command(String, String),
    Text(String),
    Hint(String, String),
    Blank,
}

/// A titled block of help output, built fluently and printed once.
pub struct GuideSection {
    title: String,
    lines: Vec<GuideLine>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, about: &str) -> Self {
        self.lines
            .push(GuideLine::Command(name.to_string(), about.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.lines.push(GuideLine::Text(text.to_string()));
        self
    }

    pub fn hint(mut self, example: &str, note: &str) -> Self {
        self.lines
            .push(GuideLine::Hint(example.to_string(), note.to_string()));
        self
    }

    pub fn blank(mut self) -> Self {
        self.lines.push(GuideLine::Blank);
        self
    }

    pub fn print(self) {
        println!("\n {}", style(&self.title).bold().underlined());
        for line in self.lines {
            match line {
                GuideLine::Command(name, about) => {
                    println!("   {:<24} {}", style(name).green(), about)
                }
                GuideLine::Text(text) => println!("   {}", text),
                GuideLine::Hint(example, note) if note.is_empty() => {
                    println!("   {} {}", style("$").dim(), style(example).cyan())
                }
                GuideLine::Hint(example, note) => println!(
                    "   {} {}  {}",
                    style("$").dim(),
                    style(example).cyan(),
                    style(note).dim()
                ),
                GuideLine::Blank => println!(),
            }
        }
    }
}
