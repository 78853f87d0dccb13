//! Masking of personal data in stored text.

use crate::extraction::rules::patterns::{CNPJ, CPF};

/// Mask CPF and CNPJ numbers, keeping only their first group.
///
/// `123.456.789-00` becomes `123.***.***-**` and `12.345.678/0001-90`
/// becomes `12.***.***/****-**`.
pub fn mask_cpf_cnpj(text: &str) -> String {
    let masked = CNPJ.replace_all(text, "$1.***.***/****-**");
    CPF.replace_all(&masked, "$1.***.***-**").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_masks_both_kinds() {
        let text = "Pagador CPF 123.456.789-00\nBeneficiário CNPJ 12.345.678/0001-90";
        assert_eq!(
            mask_cpf_cnpj(text),
            "Pagador CPF 123.***.***-**\nBeneficiário CNPJ 12.***.***/****-**"
        );
    }

    #[test]
    fn test_leaves_other_text_alone() {
        assert_eq!(mask_cpf_cnpj("Valor R$ 1.234,56"), "Valor R$ 1.234,56");
    }
}
