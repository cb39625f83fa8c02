use brick_pubmed::dtd::DtdSchema;
use brick_pubmed::transcode::transcode;
use brick_pubmed::xml::ArticleReader;

const MINI_DTD: &str = include_str!("../tests/data/pubmed_mini.dtd");

fn synthetic_document(n: usize) -> String {
    let mut xml = String::from("<PubmedArticleSet>\n");
    for pmid in 1..=n {
        xml.push_str(&format!(
            r#"<PubmedArticle><MedlineCitation Status="MEDLINE"><PMID Version="1">{pmid}</PMID>
<Article><Journal><JournalIssue><PubDate><Year>2020</Year><Month>Jan</Month></PubDate></JournalIssue>
<Title>Journal {pmid}</Title></Journal><ArticleTitle>Effects of <i>X</i> on Y ({pmid})</ArticleTitle>
<Abstract><AbstractText Label="BACKGROUND">Lorem ipsum dolor sit amet.</AbstractText></Abstract>
<AuthorList><Author><LastName>Doe</LastName><ForeName>Jane</ForeName></Author>
<Author><LastName>Roe</LastName><ForeName>Rick</ForeName></Author></AuthorList>
<Language>eng</Language><PublicationTypeList><PublicationType>Journal Article</PublicationType></PublicationTypeList>
</Article><MedlineJournalInfo><MedlineTA>J</MedlineTA></MedlineJournalInfo>
<MeshHeadingList><MeshHeading><DescriptorName>Humans</DescriptorName></MeshHeading></MeshHeadingList>
</MedlineCitation><PubmedData><PublicationStatus>ppublish</PublicationStatus>
<ArticleIdList><ArticleId IdType="pubmed">{pmid}</ArticleId></ArticleIdList></PubmedData></PubmedArticle>
"#
        ));
    }
    xml.push_str("</PubmedArticleSet>\n");
    xml
}

#[divan::bench]
fn parse_dtd() -> DtdSchema {
    DtdSchema::parse(divan::black_box(MINI_DTD))
}

#[divan::bench(args = [100, 1000])]
fn stream_and_transcode(bencher: divan::Bencher, n: usize) {
    let schema = DtdSchema::parse(MINI_DTD);
    let xml = synthetic_document(n);
    bencher.bench(|| {
        let mut reader = ArticleReader::new(xml.as_bytes());
        let mut bytes = 0;
        while let Some(article) = reader.next_article().unwrap() {
            bytes += transcode(&article, &schema).unwrap().to_json().unwrap().len();
        }
        bytes
    });
}

fn main() {
    divan::main();
}
