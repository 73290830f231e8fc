//! Key identifiers and fixed-size key sets
//!
//! DOM key names are interned into one-byte codes so key state is a 256-bit
//! bitset instead of a set of strings. Names outside the fixed table go
//! through a per-thread interner, which serialization also consults, so
//! recorded keys keep their DOM name.

use std::cell::RefCell;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// DOM `KeyboardEvent.key` values with a fixed code (index = code)
const NAMES: &[&str] = &[
    " ", "Enter", "Escape", "Tab", "Backspace", "Shift", "Control", "Alt", "Meta", "CapsLock",
    "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight", "Home", "End", "PageUp", "PageDown",
    "Insert", "Delete", "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s",
    "t", "u", "v", "w", "x", "y", "z", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L",
    "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "0", "1", "2", "3", "4",
    "5", "6", "7", "8", "9", "-", "=", "[", "]", "\\", ";", "'", ",", ".", "/", "`", "!", "@", "#",
    "$", "%", "^", "&", "*", "(", ")", "_", "+", "{", "}", "|", ":", "\"", "<", ">", "?", "~",
];

/// First code handed out to names outside the fixed table
const FIRST_INTERNED: u8 = 128;

/// DOM name of the overflow key
const UNIDENTIFIED_NAME: &str = "Unidentified";

thread_local! {
    static INTERNER: RefCell<KeyInterner> = RefCell::new(KeyInterner::new());
}

/// An interned key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u8);

impl Key {
    pub const SPACE: Key = Key(0);
    pub const ENTER: Key = Key(1);
    pub const ESCAPE: Key = Key(2);
    pub const TAB: Key = Key(3);
    pub const BACKSPACE: Key = Key(4);
    pub const SHIFT: Key = Key(5);
    pub const CONTROL: Key = Key(6);
    pub const ALT: Key = Key(7);
    pub const ARROW_UP: Key = Key(10);
    pub const ARROW_DOWN: Key = Key(11);
    pub const ARROW_LEFT: Key = Key(12);
    pub const ARROW_RIGHT: Key = Key(13);
    /// Catch-all once the interner is full
    pub const UNIDENTIFIED: Key = Key(u8::MAX);

    /// Look up a well-known DOM key name
    pub fn from_name(name: &str) -> Option<Key> {
        NAMES.iter().position(|n| *n == name).map(|i| Key(i as u8))
    }

    /// Key for any DOM name; unknown names are interned on this thread
    pub fn intern(name: &str) -> Key {
        INTERNER.with(|interner| interner.borrow_mut().resolve(name))
    }

    /// DOM name, including names interned on this thread
    pub fn dom_name(self) -> Option<String> {
        INTERNER.with(|interner| interner.borrow().name_of(self).map(str::to_string))
    }

    pub const fn from_code(code: u8) -> Key {
        Key(code)
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    /// DOM name for keys in the fixed table
    pub fn name(self) -> Option<&'static str> {
        NAMES.get(self.0 as usize).copied()
    }

    /// Keys whose browser default action (scrolling) games suppress
    pub fn is_game_key(self) -> bool {
        matches!(
            self,
            Key::SPACE | Key::ARROW_UP | Key::ARROW_DOWN | Key::ARROW_LEFT | Key::ARROW_RIGHT
        )
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(" ") => f.write_str("Space"),
            Some(name) => f.write_str(name),
            None => match self.dom_name() {
                Some(name) => f.write_str(&name),
                None => write!(f, "Key#{}", self.0),
            },
        }
    }
}

/// Wire form: the DOM name when there is one, the raw code otherwise
impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(name) = self.name() {
            return serializer.serialize_str(name);
        }
        INTERNER.with(|interner| match interner.borrow().name_of(*self) {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_u8(self.0),
        })
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Owned {
            Name(String),
            Code(u8),
        }
        match Owned::deserialize(deserializer)? {
            Owned::Code(code) => Ok(Key(code)),
            Owned::Name(name) => Ok(Key::intern(&name)),
        }
    }
}

/// Assigns codes to key names outside the fixed table
#[derive(Debug, Default)]
pub struct KeyInterner {
    extra: Vec<String>,
    overflowed: bool,
}

impl KeyInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Code for `name`, interning it on first sight
    pub fn resolve(&mut self, name: &str) -> Key {
        if let Some(key) = Key::from_name(name) {
            return key;
        }
        if name == UNIDENTIFIED_NAME {
            return Key::UNIDENTIFIED;
        }
        if let Some(i) = self.extra.iter().position(|n| n == name) {
            return Key(FIRST_INTERNED + i as u8);
        }

        let capacity = (Key::UNIDENTIFIED.0 - FIRST_INTERNED) as usize;
        if self.extra.len() >= capacity {
            if !self.overflowed {
                log::warn!("Key interner full, folding {name:?} and later keys into Unidentified");
                self.overflowed = true;
            }
            return Key::UNIDENTIFIED;
        }

        self.extra.push(name.to_string());
        Key(FIRST_INTERNED + (self.extra.len() - 1) as u8)
    }

    /// Name for any key this interner (or the fixed table) knows
    pub fn name_of(&self, key: Key) -> Option<&str> {
        if let Some(name) = key.name() {
            return Some(name);
        }
        if key == Key::UNIDENTIFIED {
            return Some(UNIDENTIFIED_NAME);
        }
        key.0
            .checked_sub(FIRST_INTERNED)
            .and_then(|i| self.extra.get(i as usize))
            .map(String::as_str)
    }
}

/// Fixed-size set of keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySet {
    bits: [u64; 4],
}

impl KeySet {
    pub const fn new() -> Self {
        Self { bits: [0; 4] }
    }

    #[inline]
    fn slot(key: Key) -> (usize, u64) {
        ((key.0 >> 6) as usize, 1u64 << (key.0 & 63))
    }

    /// Returns true if the key was not already present
    pub fn insert(&mut self, key: Key) -> bool {
        let (word, mask) = Self::slot(key);
        let fresh = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        fresh
    }

    /// Returns true if the key was present
    pub fn remove(&mut self, key: Key) -> bool {
        let (word, mask) = Self::slot(key);
        let present = self.bits[word] & mask != 0;
        self.bits[word] &= !mask;
        present
    }

    pub fn contains(&self, key: Key) -> bool {
        let (word, mask) = Self::slot(key);
        self.bits[word] & mask != 0
    }

    pub fn clear(&mut self) {
        self.bits = [0; 4];
    }

    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// Keys in ascending code order
    pub fn iter(&self) -> impl Iterator<Item = Key> + '_ {
        (0..=u8::MAX).map(Key).filter(|k| self.contains(*k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_table_fits_below_interned_range() {
        assert!(NAMES.len() <= FIRST_INTERNED as usize);
        assert_eq!(Key::from_name(" "), Some(Key::SPACE));
        assert_eq!(Key::from_name("ArrowLeft"), Some(Key::ARROW_LEFT));
        assert_eq!(Key::from_name("Escape"), Some(Key::ESCAPE));
        assert_ne!(Key::from_name("a"), Key::from_name("A"));
        assert_eq!(Key::from_name("MediaPlayPause"), None);
    }

    #[test]
    fn test_interner_accepts_unknown_names() {
        let mut interner = KeyInterner::new();
        let a = interner.resolve("MediaPlayPause");
        let b = interner.resolve("F13");
        assert_ne!(a, b);
        assert_eq!(interner.resolve("MediaPlayPause"), a);
        assert_eq!(interner.name_of(a), Some("MediaPlayPause"));
        assert_eq!(interner.resolve("z"), Key::from_name("z").unwrap());
    }

    #[test]
    fn test_interner_overflow_folds_to_unidentified() {
        let mut interner = KeyInterner::new();
        for i in 0..127 {
            assert_ne!(interner.resolve(&format!("Custom{i}")), Key::UNIDENTIFIED);
        }
        assert_eq!(interner.resolve("OneTooMany"), Key::UNIDENTIFIED);
        assert_eq!(interner.resolve("Custom3"), Key(FIRST_INTERNED + 3));
    }

    #[test]
    fn test_key_set() {
        let mut set = KeySet::new();
        assert!(set.is_empty());
        assert!(set.insert(Key::SPACE));
        assert!(!set.insert(Key::SPACE));
        assert!(set.insert(Key::UNIDENTIFIED));
        assert!(set.insert(Key(64)));
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Key::SPACE, Key(64), Key::UNIDENTIFIED]
        );
        assert!(set.remove(Key(64)));
        assert!(!set.remove(Key(64)));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_key_serializes_as_name_or_code() {
        assert_eq!(serde_json::to_string(&Key::ARROW_UP).unwrap(), "\"ArrowUp\"");
        assert_eq!(serde_json::to_string(&Key::UNIDENTIFIED).unwrap(), "\"Unidentified\"");
        // A code nothing on this thread has interned
        assert_eq!(serde_json::to_string(&Key(254)).unwrap(), "254");
        let back: Key = serde_json::from_str("\" \"").unwrap();
        assert_eq!(back, Key::SPACE);
        let back: Key = serde_json::from_str("254").unwrap();
        assert_eq!(back, Key(254));
    }

    #[test]
    fn test_interned_keys_keep_their_name_on_the_wire() {
        let key = Key::intern("MediaPlayPause");
        assert!(key.code() >= FIRST_INTERNED);
        assert_eq!(key.dom_name().as_deref(), Some("MediaPlayPause"));
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"MediaPlayPause\"");
        let back: Key = serde_json::from_str("\"MediaPlayPause\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_unknown_names_deserialize() {
        let back: Key = serde_json::from_str("\"Unidentified\"").unwrap();
        assert_eq!(back, Key::UNIDENTIFIED);
        let back: Key = serde_json::from_str("\"BrowserBack\"").unwrap();
        assert_eq!(back, Key::intern("BrowserBack"));
        assert_eq!(back.dom_name().as_deref(), Some("BrowserBack"));
    }
}
