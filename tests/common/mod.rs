//! Shared fixtures: synthetic DFP archives in the CVM publication format
//! (zip of `;`-separated, Latin-1, comma-decimal CSV members).
#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

pub const DFP_HEADER: &str = "CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;GRUPO_DFP;MOEDA;ESCALA_MOEDA;ORDEM_EXERC;DT_FIM_EXERC;CD_CONTA;DS_CONTA;VL_CONTA";

pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).collect()
}

pub fn dfp_row(company: &str, year: u16, code: &str, description: &str, value: &str) -> String {
    format!(
        "11.111.111/0001-11;{year}-12-31;1;{company};12345;DF Consolidado;REAL;MIL;ÚLTIMO;{year}-12-31;{code};{description};{value}"
    )
}

pub fn csv_body(rows: &[String]) -> String {
    let mut body = String::from(DFP_HEADER);
    for r in rows {
        body.push('\n');
        body.push_str(r);
    }
    body
}

/// Zip the given `(member stem, csv body)` pairs the way CVM names them.
pub fn dfp_archive(year: u16, members: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (stem, body) in members {
        writer
            .start_file(
                format!("dfp_cia_aberta_{stem}_{year}.csv"),
                SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(&encode_latin1(body)).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A complete four-statement archive for one company with round numbers:
/// cash 100, current assets 400, inventory 50, prepaid 10, long-term
/// assets 600, current liabilities 50, long-term liabilities 150,
/// equity 800, revenue 500, net income 80.
pub fn sample_archive(year: u16, company: &str) -> Vec<u8> {
    let bpa = csv_body(&[
        dfp_row(company, year, "1", "Ativo Total", "1000"),
        dfp_row(company, year, "1.01", "Ativo Circulante", "400"),
        dfp_row(company, year, "1.01.01", "Caixa e Equivalentes de Caixa", "100,00"),
        dfp_row(company, year, "1.01.04", "Estoques", "50"),
        dfp_row(company, year, "1.01.07", "Despesas Antecipadas", "10"),
        dfp_row(company, year, "1.02", "Ativo Não Circulante", "600"),
    ]);
    let bpp = csv_body(&[
        dfp_row(company, year, "2", "Passivo Total", "1000"),
        dfp_row(company, year, "2.01", "Passivo Circulante", "50"),
        dfp_row(company, year, "2.01.04", "Empréstimos e Financiamentos", "20"),
        dfp_row(company, year, "2.02", "Passivo Não Circulante", "150"),
        dfp_row(company, year, "2.02.01", "Empréstimos e Financiamentos", "40"),
        dfp_row(company, year, "2.03", "Patrimônio Líquido Consolidado", "800"),
    ]);
    let dre = csv_body(&[
        dfp_row(company, year, "3.01", "Receita de Venda de Bens e/ou Serviços", "500"),
        dfp_row(company, year, "3.02", "Custo dos Bens e/ou Serviços Vendidos", "-300"),
        dfp_row(company, year, "3.03", "Resultado Bruto", "200"),
        dfp_row(company, year, "3.05", "Resultado Antes do Resultado Financeiro e dos Tributos", "80"),
        dfp_row(company, year, "3.08", "Imposto de Renda e Contribuição Social sobre o Lucro", "-20"),
        dfp_row(company, year, "3.11", "Lucro/Prejuízo Consolidado do Período", "80"),
    ]);
    let dfc = csv_body(&[
        dfp_row(company, year, "6.01", "Caixa Líquido Atividades Operacionais", "120"),
        dfp_row(company, year, "6.02", "Caixa Líquido Atividades de Investimento", "-60"),
        dfp_row(company, year, "6.03", "Caixa Líquido Atividades de Financiamento", "-30"),
        dfp_row(company, year, "6.05", "Aumento (Redução) de Caixa e Equivalentes", "30"),
    ]);

    dfp_archive(
        year,
        &[
            ("BPA_con", bpa),
            ("BPP_con", bpp),
            ("DRE_con", dre),
            ("DFC_MI_con", dfc),
        ],
    )
}
