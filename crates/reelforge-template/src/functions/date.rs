use chrono::{Local, Timelike};

use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("yyyy", |_| Ok(Local::now().format("%Y").to_string()));
    registry.register("yy", |_| Ok(Local::now().format("%y").to_string()));
    registry.register("mm", |_| Ok(Local::now().format("%m").to_string()));
    registry.register("dd", |_| Ok(Local::now().format("%d").to_string()));
    registry.register("hour", |_| Ok(format!("{:02}", Local::now().hour())));
    registry.register("minute", |_| Ok(format!("{:02}", Local::now().minute())));
    registry.register("second", |_| Ok(format!("{:02}", Local::now().second())));
}

#[cfg(test)]
mod tests {
    use crate::registry::FunctionRegistry;

    #[test]
    fn date_parts_are_zero_padded() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.call("yyyy", &[]).unwrap().len(), 4);
        for name in ["yy", "mm", "dd", "hour", "minute", "second"] {
            let value = registry.call(name, &[]).unwrap();
            assert_eq!(value.len(), 2, "{name}: {value}");
            assert!(value.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
