//! End-to-end scenarios exercising the public `Terminal` API rather than
//! its internals: progress-bar overwrites, sequences split across chunks,
//! cursor save/restore, erasure, tab alignment, and color carried across
//! a line boundary.

use vt_line::Terminal;

#[test]
fn scenario_progress_bar_collapse() {
    let mut t = Terminal::new();
    t.write("Progress: 10%\r");
    t.write("Progress: 50%\r");
    t.write("Progress: 100%\n");
    assert_eq!(t.render_line(), "Progress: 100%");
}

#[test]
fn scenario_split_csi() {
    let mut t = Terminal::new();
    t.write("text\x1b[3");
    t.write("1mred\n");
    let line = t.render_line();
    assert!(line.contains("\x1b[31m"));
    assert!(line.contains("red"));
}

#[test]
fn scenario_cursor_save_restore() {
    let mut t = Terminal::new();
    t.write("ABC\x1b[sDEF\x1b[uXYZ\n");
    assert_eq!(t.render_line(), "ABCXYZ");
}

#[test]
fn scenario_horizontal_erase_to_end() {
    let mut t = Terminal::new();
    t.write("ABCDEFGH");
    t.write("\x1b[4G");
    t.write("\x1b[K\n");
    assert_eq!(t.render_line(), "ABC");
}

#[test]
fn scenario_erase_start_to_cursor() {
    let mut t = Terminal::new();
    t.write("ABCDEFGH");
    t.write("\x1b[5G");
    t.write("\x1b[1K\n");
    assert_eq!(t.render_line(), "     FGH");
}

#[test]
fn scenario_tab_alignment() {
    let mut t = Terminal::new();
    t.write("A\tB\n");
    let line = t.render_line();
    assert_eq!(line.len(), 9);
    assert_eq!(line.chars().next(), Some('A'));
    assert_eq!(line.chars().nth(8), Some('B'));
}

#[test]
fn scenario_color_carries_across_lines() {
    let mut t = Terminal::new();
    let lines = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&lines);
    t.set_line_ready_callback(move |line| sink.borrow_mut().push(line));

    t.write("\x1b[31mred\n");
    t.write("still red\n");

    let lines = lines.borrow();
    assert!(lines[0].contains("\x1b[31m"));
    assert!(lines[1].contains("\x1b[31m"));
}

#[test]
fn invariant_cursor_never_underflows_or_panics() {
    let mut t = Terminal::new();
    for chunk in [
        "ABC\x1b[10D",
        "\x1b[50Cxyz",
        "\x1b[1K",
        "\x1b[2P",
        "\x1b[3@",
        "\x08\x08",
        "\t\t",
    ] {
        t.write(chunk);
    }
    // None of the above panicked; the cursor stayed within the sanity bound.
    assert!(t.cursor() < 1_000_001);
}

#[test]
fn invariant_plain_write_does_not_touch_sgr() {
    let mut t = Terminal::new();
    t.write("\x1b[31mred");
    let before = t.render_line();
    t.write("more plain text");
    let after = t.render_line();
    assert!(before.contains("\x1b[31m"));
    assert!(after.starts_with("\x1b[31m"));
}
