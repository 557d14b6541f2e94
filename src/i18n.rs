// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库，语言文件位于 locales/
// 支持西班牙语（默认，面向工厂操作员）、英文、中文
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 默认语言
pub const DEFAULT_LOCALE: &str = "es-MX";

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"es-MX" / "en" / "zh-CN"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数，占位符形如 %{name}）
///
/// # 示例
/// ```no_run
/// use recipe_governance::i18n::t_with_args;
/// let msg = t_with_args("save.duplicate_code", &[("code", "5-250-2-B-28-10-D-2-000")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // locale 为全局状态，测试并行执行时需串行化
    static LOCALE_TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_translate_per_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();

        set_locale("es-MX");
        assert_eq!(t("validation.missing_water"), "Falta material de agua");

        set_locale("en");
        assert_eq!(t("validation.missing_water"), "Water material is missing");

        set_locale(DEFAULT_LOCALE);
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();

        set_locale("zh-CN");
        let msg = t_with_args("save.duplicate_code", &[("code", "5-250-2-B-28-10-D-2-000")]);
        assert!(msg.contains("5-250-2-B-28-10-D-2-000"));
        assert!(msg.contains("重复"));

        set_locale(DEFAULT_LOCALE);
    }
}
