//! Identifiers the target language will not accept as user names

/// Keywords, storage qualifiers and common macros of the target language
const KEYWORDS: &[&str] = &[
    // C
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Bool", "_Complex", "_Imaginary",
    // Object extensions
    "BOOL", "Class", "IMP", "SEL", "YES", "NO", "NULL", "Nil", "id", "nil", "self", "super",
    "in", "out", "inout", "oneway", "bycopy", "byref", "nonatomic", "readonly", "readwrite",
    "retain", "assign", "strong", "weak", "unsafe_unretained", "atomic", "getter", "setter",
    "__block", "__strong", "__weak", "__unsafe_unretained", "__autoreleasing", "__bridge",
    // Runtime and standard headers
    "errno", "stdin", "stdout", "stderr", "assert", "bool", "true", "false", "NAN", "INFINITY",
    "EOF", "DEBUG", "TRUE", "FALSE", "main",
];

/// Messages understood by the root object; declaring a method with one of
/// these names would override runtime behavior
const ROOT_OBJECT_MESSAGES: &[&str] = &[
    "alloc", "attributeKeys", "autoContentAccessingProxy", "autorelease", "classCode",
    "classDescription", "classForArchiver", "classForKeyedArchiver",
    "classFallbacksForKeyedArchiver", "classForPortCoder", "className", "copy", "dealloc",
    "description", "hash", "init", "initialize", "isProxy", "load", "mutableCopy", "new",
    "release", "retain", "retainCount", "scriptingProperties", "self", "superclass",
    "toManyRelationshipKeys", "toOneRelationshipKeys", "version",
];

/// Parameter names that are qualifiers in method declarations
const BAD_PARAMETER_NAMES: &[&str] = &["in", "out", "inout", "oneway", "bycopy", "byref"];

pub fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || ROOT_OBJECT_MESSAGES.contains(&name)
}

pub fn is_bad_parameter_name(name: &str) -> bool {
    BAD_PARAMETER_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved("id"));
        assert!(is_reserved("hash"));
        assert!(is_reserved("while"));
        assert!(!is_reserved("count"));
    }
}
