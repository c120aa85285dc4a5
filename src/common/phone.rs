// src/common/phone.rs

// Tamanho do número nacional (Índia: 10 dígitos)
const NATIONAL_NUMBER_LEN: usize = 10;

/// Converte um telefone "cru" para o formato canônico `+<ddi><numero>`.
///
/// É a única forma de deduplicar leads vindos de canais diferentes
/// (planilha, webhook, cadastro manual) e de casar o remetente de uma
/// mensagem do WhatsApp com um contato já salvo.
///
/// Retorna `None` quando o número não é reconhecido, em vez de "adivinhar".
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    // Mantém apenas dígitos e o '+'
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    // 1. Já está no formato internacional
    if cleaned.starts_with('+') {
        return if cleaned.len() > 1 { Some(cleaned) } else { None };
    }

    // 2. Só os dígitos daqui pra frente
    let digits: String = cleaned.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // 3. Prefixo internacional de discagem "00"
    if let Some(rest) = digits.strip_prefix("00") {
        return if rest.is_empty() { None } else { Some(format!("+{}", rest)) };
    }

    // 4. DDI + número nacional (ex: 91 + 10 dígitos)
    if digits.starts_with(default_country_code)
        && digits.len() == default_country_code.len() + NATIONAL_NUMBER_LEN
    {
        return Some(format!("+{}", digits));
    }

    // 5. Número nacional puro
    if digits.len() == NATIONAL_NUMBER_LEN {
        return Some(format!("+{}{}", default_country_code, digits));
    }

    // 6. Prefixo de tronco doméstico "0" + número nacional
    if let Some(national) = digits.strip_prefix('0') {
        if national.len() == NATIONAL_NUMBER_LEN {
            return Some(format!("+{}{}", default_country_code, national));
        }
    }

    // 7. Não reconhecido
    None
}

/// Variações de formato que registros antigos podem ter salvo para o mesmo
/// número canônico. Usado nas buscas do Lead Matcher e da importação.
pub fn stored_variants(canonical: &str) -> Vec<String> {
    let mut variants = vec![canonical.to_string()];

    let digits = canonical.trim_start_matches('+');
    if digits.is_empty() {
        return variants;
    }

    let mut push = |v: String| {
        if !variants.contains(&v) {
            variants.push(v);
        }
    };

    push(digits.to_string());
    push(format!("00{}", digits));

    if digits.is_ascii() && digits.len() > NATIONAL_NUMBER_LEN {
        let national = &digits[digits.len() - NATIONAL_NUMBER_LEN..];
        push(national.to_string());
        push(format!("0{}", national));
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_national_numbers_get_the_default_country_code() {
        for n in ["9876543210", "1234567890", "7000000001"] {
            assert_eq!(normalize_phone(n, "91"), Some(format!("+91{}", n)));
        }
    }

    #[test]
    fn canonical_numbers_are_returned_unchanged() {
        for p in ["+919876543210", "+14155550123", "+447911123456"] {
            assert_eq!(normalize_phone(p, "91").as_deref(), Some(p));
        }
    }

    #[test]
    fn formatting_characters_are_stripped() {
        assert_eq!(normalize_phone("+91 98765-43210", "91").as_deref(), Some("+919876543210"));
        assert_eq!(normalize_phone("(98765) 43210", "91").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn international_trunk_prefix_is_rewritten() {
        assert_eq!(normalize_phone("00919876543210", "91").as_deref(), Some("+919876543210"));
        assert_eq!(normalize_phone("0014155550123", "91").as_deref(), Some("+14155550123"));
    }

    #[test]
    fn country_code_with_national_number_gets_a_plus() {
        assert_eq!(normalize_phone("919876543210", "91").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn domestic_trunk_zero_is_dropped() {
        assert_eq!(normalize_phone("09876543210", "91").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn unrecognized_numbers_fail() {
        assert_eq!(normalize_phone("", "91"), None);
        assert_eq!(normalize_phone("+", "91"), None);
        assert_eq!(normalize_phone("12345", "91"), None);
        assert_eq!(normalize_phone("00", "91"), None);
        assert_eq!(normalize_phone("14155550123", "91"), None);
        assert_eq!(normalize_phone("not a phone", "91"), None);
    }

    #[test]
    fn variants_cover_legacy_formats() {
        let variants = stored_variants("+919876543210");
        for expected in ["+919876543210", "919876543210", "9876543210", "09876543210", "00919876543210"] {
            assert!(variants.iter().any(|v| v == expected), "faltou {}", expected);
        }
    }
}
