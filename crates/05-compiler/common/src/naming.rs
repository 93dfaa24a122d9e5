//! 命名工具函数
//!
//! 生成代码中的类型名、字段名和局部变量名都由这里派生。

/// Rust 关键字（包括保留字），不能用作模块、Bean 或插槽名
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// 将驼峰命名转换为蛇形命名
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && i > 0 {
            // 检查前一个字符是否为小写，或者下一个字符是否为小写
            let prev_is_lower = chars.get(i - 1).map_or(false, |c| c.is_lowercase());
            let next_is_lower = chars.get(i + 1).map_or(false, |c| c.is_lowercase());

            if (prev_is_lower || next_is_lower) && !result.ends_with('_') {
                result.push('_');
            }
        }
        result.push(ch.to_lowercase().next().unwrap_or(ch));
    }

    result
}

/// 将蛇形命名转换为帕斯卡命名
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;

    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(ch.to_uppercase().next().unwrap_or(ch));
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

/// 验证标识符是否有效
///
/// 只接受 ASCII 标识符，并拒绝 Rust 关键字。
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first_char) = chars.next() else {
        return false;
    };

    // 第一个字符必须是字母或下划线
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return false;
    }
    if s == "_" || RUST_KEYWORDS.contains(&s) {
        return false;
    }

    // 其余字符必须是字母、数字或下划线
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// 由模块路径生成生成代码中的模块类型名
///
/// `app.storage` → `AppStorageModule`
pub fn module_type_name(path: &str) -> String {
    let mut name: String = path.split('.').map(to_pascal_case).collect();
    name.push_str("Module");
    name
}

/// 由模块路径生成生成代码中的插槽输入类型名
pub fn sockets_type_name(path: &str) -> String {
    format!("{}Sockets", module_type_name(path))
}

/// 由模块路径生成可嵌入标识符的片段
///
/// `app.storage` → `app__storage`，双下划线避免与名称内部的下划线冲突。
pub fn path_ident(path: &str) -> String {
    path.split('.').map(to_snake_case).collect::<Vec<_>>().join("__")
}

/// 模块源码文件名
pub fn source_file_name(path: &str) -> String {
    format!("{}.rs", path_ident(path))
}

/// 模块描述符文件名
pub fn descriptor_file_name(path: &str) -> String {
    format!("{}.module.json", path_ident(path))
}

/// Bean 在导入字段中的键：`import__<键>`、`i_<键>`
pub fn bean_key(module_path: &str, bean: &str) -> String {
    format!("{}__{}", path_ident(module_path), bean)
}

/// 插槽在延迟单元格字段中的键：`deferred__<键>`、`d_<键>`
///
/// 模块插槽的所有者部分为空。
pub fn socket_key(module_path: &str, owner: Option<&str>, socket: &str) -> String {
    format!("{}__{}__{}", path_ident(module_path), owner.unwrap_or_default(), socket)
}
