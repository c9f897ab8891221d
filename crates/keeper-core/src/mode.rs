//! Extended permission values and file modes
//!
//! Override files describe permissions as an *extended* value: the usual
//! nine rwx bits, with sticky, setgid and setuid carried as three extra bits
//! directly above them. [`Perms`] decodes that value into rwx bits plus
//! [`SpecialBits`] and folds them into a raw `st_mode`.

/// Sticky flag in an extended permission value.
pub const STICKY_BIT: u32 = 1 << 9;
/// Setgid flag in an extended permission value.
pub const SETGID_BIT: u32 = 1 << 10;
/// Setuid flag in an extended permission value.
pub const SETUID_BIT: u32 = 1 << 11;

const RWX_MASK: u32 = 0o777;

/// Special flags as they appear in `st_mode`.
pub const MODE_STICKY: u32 = 0o1000;
pub const MODE_SETGID: u32 = 0o2000;
pub const MODE_SETUID: u32 = 0o4000;

/// File type bits of `st_mode`.
pub const MODE_TYPE_MASK: u32 = 0o170000;
pub const MODE_DIR: u32 = 0o040000;
pub const MODE_FILE: u32 = 0o100000;
pub const MODE_SYMLINK: u32 = 0o120000;
const MODE_FIFO: u32 = 0o010000;
const MODE_CHAR: u32 = 0o020000;
const MODE_BLOCK: u32 = 0o060000;
const MODE_SOCKET: u32 = 0o140000;

/// The sticky, setgid and setuid flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialBits {
    pub sticky: bool,
    pub setgid: bool,
    pub setuid: bool,
}

/// Decoded permission value: rwx bits plus special flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Perms {
    pub rwx: u32,
    pub special: SpecialBits,
}

impl Perms {
    /// Decode an extended permission value. Bits above the low 12 are
    /// ignored.
    pub fn decode(extended: u32) -> Self {
        Self {
            rwx: extended & RWX_MASK,
            special: SpecialBits {
                sticky: extended & STICKY_BIT != 0,
                setgid: extended & SETGID_BIT != 0,
                setuid: extended & SETUID_BIT != 0,
            },
        }
    }

    /// Re-encode into the extended form.
    pub fn encode(self) -> u32 {
        let mut extended = self.rwx & RWX_MASK;
        if self.special.sticky {
            extended |= STICKY_BIT;
        }
        if self.special.setgid {
            extended |= SETGID_BIT;
        }
        if self.special.setuid {
            extended |= SETUID_BIT;
        }
        extended
    }

    /// Read the permission part of a raw `st_mode`.
    pub fn from_mode(mode: u32) -> Self {
        Self {
            rwx: mode & RWX_MASK,
            special: SpecialBits {
                sticky: mode & MODE_STICKY != 0,
                setgid: mode & MODE_SETGID != 0,
                setuid: mode & MODE_SETUID != 0,
            },
        }
    }

    /// Permission bits in `st_mode` layout.
    pub fn mode_bits(self) -> u32 {
        let mut bits = self.rwx & RWX_MASK;
        if self.special.sticky {
            bits |= MODE_STICKY;
        }
        if self.special.setgid {
            bits |= MODE_SETGID;
        }
        if self.special.setuid {
            bits |= MODE_SETUID;
        }
        bits
    }

    /// Replace every permission bit of `mode`, keeping its file type.
    pub fn apply_to(self, mode: u32) -> u32 {
        (mode & MODE_TYPE_MASK) | self.mode_bits()
    }
}

/// Render a raw mode the way `ls -l` does, e.g. `drwxr-xr-x` or `-rwsr-x---`.
pub fn mode_string(mode: u32) -> String {
    let kind = match mode & MODE_TYPE_MASK {
        MODE_DIR => 'd',
        MODE_SYMLINK => 'l',
        MODE_FIFO => 'p',
        MODE_CHAR => 'c',
        MODE_BLOCK => 'b',
        MODE_SOCKET => 's',
        _ => '-',
    };

    let perms = Perms::from_mode(mode);
    let bit = |mask: u32, c: char| if perms.rwx & mask != 0 { c } else { '-' };
    let exec = |mask: u32, special: bool, set: char| match (perms.rwx & mask != 0, special) {
        (true, true) => set,
        (false, true) => set.to_ascii_uppercase(),
        (true, false) => 'x',
        (false, false) => '-',
    };

    [
        kind,
        bit(0o400, 'r'),
        bit(0o200, 'w'),
        exec(0o100, perms.special.setuid, 's'),
        bit(0o040, 'r'),
        bit(0o020, 'w'),
        exec(0o010, perms.special.setgid, 's'),
        bit(0o004, 'r'),
        bit(0o002, 'w'),
        exec(0o001, perms.special.sticky, 't'),
    ]
    .into_iter()
    .collect()
}
