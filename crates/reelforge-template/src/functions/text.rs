use reelforge_common::{Error, Result};

use super::{arg, int_arg};
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("pad", pad);
    registry.register("retimepad", retimepad);
    registry.register("upper", |args| Ok(args.join(" ").to_uppercase()));
    registry.register("lower", |args| Ok(args.join(" ").to_lowercase()));
    registry.register("replace", replace);
    registry.register("remove", remove);
}

/// `pad <value> <width>`: zero-pads an integer.
fn pad(args: &[&str]) -> Result<String> {
    let value = int_arg("pad", args, 0)?;
    let width = int_arg("pad", args, 1)?;
    zero_pad("pad", value, width)
}

/// `retimepad <value> <offset> <width>`: shifts a frame number, then pads.
fn retimepad(args: &[&str]) -> Result<String> {
    let value = int_arg("retimepad", args, 0)?;
    let offset = int_arg("retimepad", args, 1)?;
    let width = int_arg("retimepad", args, 2)?;
    let shifted = value.checked_add(offset).ok_or_else(|| {
        Error::template_function("retimepad", format!("{value} + {offset} overflows"))
    })?;
    zero_pad("retimepad", shifted, width)
}

/// Widest padding a template may ask for.
const MAX_PAD_WIDTH: i64 = 64;

fn zero_pad(function: &str, value: i64, width: i64) -> Result<String> {
    if width > MAX_PAD_WIDTH {
        return Err(Error::template_function(
            function,
            format!("width {width} exceeds {MAX_PAD_WIDTH}"),
        ));
    }
    let width = usize::try_from(width).unwrap_or(0);
    if value < 0 {
        Ok(format!("-{:0>width$}", value.unsigned_abs(), width = width.saturating_sub(1)))
    } else {
        Ok(format!("{value:0>width$}"))
    }
}

/// `replace <value> <from> <to>`
fn replace(args: &[&str]) -> Result<String> {
    let value = arg("replace", args, 0)?;
    let from = arg("replace", args, 1)?;
    let to = args.get(2).copied().unwrap_or_default();
    Ok(value.replace(from, to))
}

/// `remove <value> <pattern>...`
fn remove(args: &[&str]) -> Result<String> {
    let mut value = arg("remove", args, 0)?.to_string();
    for pattern in &args[1..] {
        value = value.replace(pattern, "");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn padding() {
        assert_eq!(pad(&["7", "4"]).unwrap(), "0007");
        assert_eq!(pad(&["12345", "4"]).unwrap(), "12345");
        assert_eq!(pad(&["-7", "4"]).unwrap(), "-007");
        assert_eq!(retimepad(&["1001", "-1000", "4"]).unwrap(), "0001");
        assert!(pad(&["abc", "4"]).is_err());
        assert!(pad(&["1"]).is_err());
    }

    #[test]
    fn retime_overflow_is_an_error() {
        assert_matches!(
            retimepad(&["9223372036854775807", "1", "4"]),
            Err(Error::TemplateFunction { .. })
        );
        assert_eq!(retimepad(&["-9223372036854775807", "-1", "4"]).unwrap(), "-9223372036854775808");
    }

    #[test]
    fn oversized_width_is_rejected() {
        assert_matches!(pad(&["1", "100000000000"]), Err(Error::TemplateFunction { .. }));
        assert_eq!(pad(&["1", "64"]).unwrap().len(), 64);
        assert_eq!(pad(&["1", "-3"]).unwrap(), "1");
    }

    #[test]
    fn string_edits() {
        assert_eq!(replace(&["shot_plate", "_plate", "_comp"]).unwrap(), "shot_comp");
        assert_eq!(replace(&["shot_plate", "_plate"]).unwrap(), "shot");
        assert_eq!(remove(&["a_b_c", "_", "c"]).unwrap(), "ab");
    }
}
