//! Synthetic input via macOS CGEvent
//!
//! Every command posts one or more CGEvents at the HID tap location and
//! then pauses briefly so the window server sees discrete events.

use std::thread;
use std::time::Duration;

use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTapLocation, CGEventType, CGKeyCode, CGMouseButton,
    ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::CGPoint;
use tracing::debug;

use super::backend::{InputBackend, InputError};
use super::command::{ActionCommand, Key};
use crate::pointer::ScreenSize;

/// Pause after every posted command
const COMMAND_PAUSE: Duration = Duration::from_millis(10);
/// Settle time between moving onto a target and clicking it
const CLICK_SETTLE: Duration = Duration::from_millis(50);

/// Virtual key codes (ANSI layout)
mod keycodes {
    use core_graphics::event::CGKeyCode;

    pub const CONTROL: CGKeyCode = 0x3B;
    pub const EQUAL: CGKeyCode = 0x18;
    pub const MINUS: CGKeyCode = 0x1B;
}

/// Posts CGEvents for each command
pub struct CoreGraphicsBackend {
    source: CGEventSource,
    screen: ScreenSize,
}

impl CoreGraphicsBackend {
    /// Create a backend bound to the main display
    pub fn new() -> Result<Self, InputError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| InputError::EventSource)?;
        let bounds = CGDisplay::main().bounds();
        let screen = ScreenSize::new(bounds.size.width as u32, bounds.size.height as u32);
        debug!(width = screen.width, height = screen.height, "main display bounds");
        Ok(Self { source, screen })
    }

    fn cursor_location(&self) -> Result<CGPoint, InputError> {
        CGEvent::new(self.source.clone())
            .map(|event| event.location())
            .map_err(|_| InputError::EventCreation("location query"))
    }

    fn post_mouse(
        &self,
        event_type: CGEventType,
        at: CGPoint,
        name: &'static str,
    ) -> Result<(), InputError> {
        let event = CGEvent::new_mouse_event(self.source.clone(), event_type, at, CGMouseButton::Left)
            .map_err(|_| InputError::EventCreation(name))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_key(&self, code: CGKeyCode, down: bool, flags: CGEventFlags) -> Result<(), InputError> {
        let event = CGEvent::new_keyboard_event(self.source.clone(), code, down)
            .map_err(|_| InputError::EventCreation("keyboard"))?;
        event.set_flags(flags);
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_hotkey(&self, keys: &[Key]) -> Result<(), InputError> {
        let flags = if keys.contains(&Key::Control) {
            CGEventFlags::CGEventFlagControl
        } else {
            CGEventFlags::CGEventFlagNull
        };

        let codes: Vec<CGKeyCode> = keys.iter().map(|key| keycode(*key)).collect();
        for code in &codes {
            self.post_key(*code, true, flags)?;
        }
        for code in codes.iter().rev() {
            self.post_key(*code, false, flags)?;
        }
        Ok(())
    }
}

impl InputBackend for CoreGraphicsBackend {
    fn name(&self) -> &'static str {
        "core-graphics"
    }

    fn execute(&mut self, command: &ActionCommand) -> Result<(), InputError> {
        match command {
            ActionCommand::MoveTo { x, y } => {
                let at = CGPoint::new(f64::from(*x), f64::from(*y));
                self.post_mouse(CGEventType::MouseMoved, at, "mouse move")?;
            }
            ActionCommand::ButtonDown => {
                let at = self.cursor_location()?;
                self.post_mouse(CGEventType::LeftMouseDown, at, "mouse down")?;
            }
            ActionCommand::ButtonUp => {
                let at = self.cursor_location()?;
                self.post_mouse(CGEventType::LeftMouseUp, at, "mouse up")?;
            }
            ActionCommand::Click => {
                thread::sleep(CLICK_SETTLE);
                let at = self.cursor_location()?;
                self.post_mouse(CGEventType::LeftMouseDown, at, "mouse down")?;
                self.post_mouse(CGEventType::LeftMouseUp, at, "mouse up")?;
            }
            ActionCommand::DragTo { x, y, duration_ms } => {
                let at = CGPoint::new(f64::from(*x), f64::from(*y));
                self.post_mouse(CGEventType::LeftMouseDragged, at, "mouse drag")?;
                thread::sleep(Duration::from_millis(*duration_ms));
            }
            ActionCommand::Scroll { amount } => {
                let event = CGEvent::new_scroll_event(
                    self.source.clone(),
                    ScrollEventUnit::LINE,
                    1,
                    *amount,
                    0,
                    0,
                )
                .map_err(|_| InputError::EventCreation("scroll"))?;
                event.post(CGEventTapLocation::HID);
            }
            ActionCommand::Hotkey { keys } => self.post_hotkey(keys)?,
        }

        thread::sleep(COMMAND_PAUSE);
        Ok(())
    }

    fn screen_size(&self) -> ScreenSize {
        self.screen
    }
}

fn keycode(key: Key) -> CGKeyCode {
    match key {
        Key::Control => keycodes::CONTROL,
        // "+" lives on the "=" key
        Key::Plus => keycodes::EQUAL,
        Key::Minus => keycodes::MINUS,
    }
}
