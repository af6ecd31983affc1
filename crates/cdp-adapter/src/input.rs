use bitflags::bitflags;

bitflags! {
    /// Modifier mask as understood by `Input.dispatchKeyEvent`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const ALT = 1;
        const CONTROL = 2;
        const META = 4;
        const SHIFT = 8;
    }
}

/// One key press (down + up) to dispatch against the focused element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub code: String,
    pub text: Option<String>,
    pub windows_virtual_key_code: Option<i64>,
    pub modifiers: Modifiers,
    /// Editing commands (e.g. `selectAll`) the browser runs with the key.
    pub commands: Vec<String>,
}

impl KeyInput {
    /// A printable character.
    pub fn char(ch: char) -> Self {
        if ch == '\n' {
            // Shift+Enter inserts a line break in chat composers without submitting.
            let mut enter = Self::named("Enter");
            enter.modifiers = Modifiers::SHIFT;
            enter.text = Some("\r".to_string());
            return enter;
        }
        Self {
            key: ch.to_string(),
            code: String::new(),
            text: Some(ch.to_string()),
            windows_virtual_key_code: None,
            modifiers: Modifiers::empty(),
            commands: Vec::new(),
        }
    }

    /// A non-printing key such as `Enter` or `Backspace`.
    pub fn named(key: &str) -> Self {
        let (code, vk, text) = match key {
            "Enter" => ("Enter", Some(13), Some("\r")),
            "Backspace" => ("Backspace", Some(8), None),
            "Delete" => ("Delete", Some(46), None),
            "Tab" => ("Tab", Some(9), None),
            "Escape" => ("Escape", Some(27), None),
            _ => (key, None, None),
        };
        Self {
            key: key.to_string(),
            code: code.to_string(),
            text: text.map(str::to_string),
            windows_virtual_key_code: vk,
            modifiers: Modifiers::empty(),
            commands: Vec::new(),
        }
    }

    /// Select everything in the focused field.
    pub fn select_all() -> Self {
        Self {
            key: "a".to_string(),
            code: "KeyA".to_string(),
            text: None,
            windows_virtual_key_code: Some(65),
            modifiers: Modifiers::CONTROL,
            commands: vec!["selectAll".to_string()],
        }
    }

    pub fn is_plain_text(&self) -> bool {
        self.text.is_some()
            && self.code.is_empty()
            && !self
                .modifiers
                .intersects(Modifiers::CONTROL | Modifiers::META | Modifiers::ALT)
    }
}
