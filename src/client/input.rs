//! Key dispatch.
//!
//! Maps crossterm key events onto editing, scrolling, window and buffer
//! actions. Returns `true` when the application should exit.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::ui::compose::Ui;
use crate::ui::window::{WindowId, WindowTree};

use super::Client;

pub fn handle_key(
    client: &mut Client,
    tree: &mut WindowTree,
    focus: &mut WindowId,
    ui: &mut Ui,
    key: KeyEvent,
) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char('c') if ctrl => {
            client.quit();
            return true;
        }

        // line editing
        KeyCode::Char('a') if ctrl => with_input(client, tree, *focus, |i| i.home()),
        KeyCode::Char('e') if ctrl => with_input(client, tree, *focus, |i| i.end()),
        KeyCode::Char('k') if ctrl => with_input(client, tree, *focus, |i| i.kill_to_end()),
        KeyCode::Backspace => with_input(client, tree, *focus, |i| i.backspace()),
        KeyCode::Left if !alt && !shift => with_input(client, tree, *focus, |i| i.left()),
        KeyCode::Right if !alt && !shift => with_input(client, tree, *focus, |i| i.right()),
        KeyCode::Enter => {
            let buffer = tree.leaf(*focus).buffer;
            client.send_input(buffer);
        }

        // buffer switching
        KeyCode::Left if alt => {
            let current = tree.leaf(*focus).buffer;
            tree.leaf_mut(*focus).buffer = client.prev_buffer(current);
        }
        KeyCode::Right if alt => {
            let current = tree.leaf(*focus).buffer;
            tree.leaf_mut(*focus).buffer = client.next_buffer(current);
        }
        KeyCode::Char('n') if ctrl => {
            let current = tree.leaf(*focus).buffer;
            tree.leaf_mut(*focus).buffer = client.jump_active(current);
        }
        KeyCode::Char('s') if ctrl => {
            let current = tree.leaf(*focus).buffer;
            tree.leaf_mut(*focus).buffer = client.jump_server(current);
        }
        KeyCode::Char('w') if ctrl => {
            let current = tree.leaf(*focus).buffer;
            client.leave_buffer(current, tree);
        }

        // scrolling
        KeyCode::PageUp => {
            let buffer = tree.leaf(*focus).buffer;
            let count = client.locate(buffer).map_or(0, |(_, b)| b.messages.len());
            let state = tree.leaf_mut(*focus);
            state.scroll = (state.scroll + 5).min(count);
        }
        KeyCode::PageDown => {
            let state = tree.leaf_mut(*focus);
            state.scroll = state.scroll.saturating_sub(5);
        }

        // windows
        KeyCode::Char('q') if ctrl => {
            let buffer = tree.leaf(*focus).buffer;
            let (first, _) = tree.hsplit(*focus, buffer, -1);
            *focus = first;
        }
        KeyCode::Char('v') if ctrl => {
            let buffer = tree.leaf(*focus).buffer;
            let (first, _) = tree.vsplit(*focus, buffer, -1);
            *focus = first;
        }
        KeyCode::Char('x') if ctrl => {
            *focus = tree.delete(*focus);
        }
        KeyCode::Char('r') if ctrl => {
            let state = tree.leaf_mut(*focus);
            state.resize_mode = !state.resize_mode;
        }
        KeyCode::Char('f') if ctrl => {
            let state = tree.leaf_mut(*focus);
            state.search_mode = !state.search_mode;
        }
        KeyCode::Char('b') if ctrl => {
            ui.show_rooms = !ui.show_rooms;
        }

        // navigate, or grow the window in resize mode
        KeyCode::Up if shift => {
            if tree.leaf(*focus).resize_mode {
                tree.grow_y(*focus, 1);
            } else {
                *focus = tree.up(*focus);
            }
        }
        KeyCode::Down if shift => {
            if tree.leaf(*focus).resize_mode {
                tree.grow_y(*focus, -1);
            } else {
                *focus = tree.down(*focus);
            }
        }
        KeyCode::Left if shift => {
            if tree.leaf(*focus).resize_mode {
                tree.grow_x(*focus, -1);
            } else {
                *focus = tree.left(*focus);
            }
        }
        KeyCode::Right if shift => {
            if tree.leaf(*focus).resize_mode {
                tree.grow_x(*focus, 1);
            } else {
                *focus = tree.right(*focus);
            }
        }

        KeyCode::Char(ch) if !ctrl && !alt => {
            with_input(client, tree, *focus, |i| i.insert(ch));
        }

        _ => {}
    }

    false
}

fn with_input(
    client: &mut Client,
    tree: &WindowTree,
    focus: WindowId,
    f: impl FnOnce(&mut super::buffer::InputLine),
) {
    let buffer = tree.leaf(focus).buffer;
    if let Some(buffer) = client.buffer_mut(buffer) {
        f(&mut buffer.input);
    }
}
