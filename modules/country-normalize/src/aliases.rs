use once_cell::sync::Lazy;
use regex::Regex;

/// Maps a free-form country name to a standard short name.
pub trait CountryConverter: Send + Sync {
    fn convert(&self, raw: &str) -> Option<String>;
}

struct Country {
    name: &'static str,
    iso2: &'static str,
    iso3: &'static str,
    pattern: Regex,
}

// (short name, alpha-2, alpha-3, name pattern). Patterns are matched
// case-insensitively against the whole canonicalized input, where a trailing
// parenthesized qualifier has become a comma clause:
// "Korea (Republic of)" is matched as "Korea, Republic of".
const TABLE: &[(&str, &str, &str, &str)] = &[
    ("Afghanistan", "AF", "AFG", r"afghanistan|islamic (republic|emirate) of afghanistan"),
    ("Aland Islands", "AX", "ALA", r"[aå]land( islands)?"),
    ("Albania", "AL", "ALB", r"albania"),
    ("Algeria", "DZ", "DZA", r"algeria"),
    ("American Samoa", "AS", "ASM", r"american samoa"),
    ("Andorra", "AD", "AND", r"andorra"),
    ("Angola", "AO", "AGO", r"angola"),
    ("Anguilla", "AI", "AIA", r"anguilla"),
    ("Antarctica", "AQ", "ATA", r"antarctica"),
    ("Antigua and Barbuda", "AG", "ATG", r"antigua( (and|&) barbuda)?"),
    ("Argentina", "AR", "ARG", r"argentina"),
    ("Armenia", "AM", "ARM", r"armenia"),
    ("Aruba", "AW", "ABW", r"aruba"),
    ("Australia", "AU", "AUS", r"australia"),
    ("Austria", "AT", "AUT", r"austria"),
    ("Azerbaijan", "AZ", "AZE", r"azerbaijan"),
    ("Bahamas", "BS", "BHS", r"(the )?bahamas(, the)?"),
    ("Bahrain", "BH", "BHR", r"bahrain"),
    ("Bangladesh", "BD", "BGD", r"bangladesh"),
    ("Barbados", "BB", "BRB", r"barbados"),
    ("Belarus", "BY", "BLR", r"belarus|byelorussia"),
    ("Belgium", "BE", "BEL", r"belgium"),
    ("Belize", "BZ", "BLZ", r"belize"),
    ("Benin", "BJ", "BEN", r"benin"),
    ("Bermuda", "BM", "BMU", r"bermuda"),
    ("Bhutan", "BT", "BTN", r"bhutan"),
    ("Bolivia", "BO", "BOL", r"bolivia(,? plurinational state of)?|plurinational state of bolivia"),
    ("Caribbean Netherlands", "BQ", "BES", r"caribbean netherlands|bonaire(,? sint eustatius,? (and|&) saba)?"),
    ("Bosnia and Herzegovina", "BA", "BIH", r"bosnia( (and|&) herzegovina)?|bosnia-herzegovina"),
    ("Botswana", "BW", "BWA", r"botswana"),
    ("Bouvet Island", "BV", "BVT", r"bouvet island"),
    ("Brazil", "BR", "BRA", r"brazil|brasil"),
    ("British Indian Ocean Territory", "IO", "IOT", r"british indian ocean territory"),
    ("Brunei", "BN", "BRN", r"brunei( darussalam)?"),
    ("Bulgaria", "BG", "BGR", r"bulgaria"),
    ("Burkina Faso", "BF", "BFA", r"burkina faso"),
    ("Burundi", "BI", "BDI", r"burundi"),
    ("Cabo Verde", "CV", "CPV", r"cabo verde|cape verde"),
    ("Cambodia", "KH", "KHM", r"cambodia|kampuchea"),
    ("Cameroon", "CM", "CMR", r"cameroon"),
    ("Canada", "CA", "CAN", r"canada"),
    ("Cayman Islands", "KY", "CYM", r"cayman islands"),
    ("Central African Republic", "CF", "CAF", r"central african republic"),
    ("Chad", "TD", "TCD", r"chad"),
    ("Chile", "CL", "CHL", r"chile"),
    ("China", "CN", "CHN", r"china|people'?s republic of china|china, people'?s republic of|prc"),
    ("Christmas Island", "CX", "CXR", r"christmas island"),
    ("Cocos (Keeling) Islands", "CC", "CCK", r"cocos( \(keeling\))? islands|cocos,? keeling islands|keeling islands"),
    ("Colombia", "CO", "COL", r"colombia"),
    ("Comoros", "KM", "COM", r"comoros"),
    ("Congo Republic", "CG", "COG", r"congo( republic)?|congo, (the )?republic of( the)?|republic of (the )?congo|congo[- ]brazzaville"),
    ("DR Congo", "CD", "COD", r"dr congo|congo,? (the )?democratic republic of( the)?|democratic republic of (the )?congo|congo[- ]kinshasa|zaire"),
    ("Cook Islands", "CK", "COK", r"cook islands"),
    ("Costa Rica", "CR", "CRI", r"costa rica"),
    ("Ivory Coast", "CI", "CIV", r"ivory coast|c[oô]te d'?ivoire"),
    ("Croatia", "HR", "HRV", r"croatia|hrvatska"),
    ("Cuba", "CU", "CUB", r"cuba"),
    ("Curacao", "CW", "CUW", r"cura[cç]ao"),
    ("Cyprus", "CY", "CYP", r"cyprus"),
    ("Czech Republic", "CZ", "CZE", r"czech republic|czechia"),
    ("Denmark", "DK", "DNK", r"denmark"),
    ("Djibouti", "DJ", "DJI", r"djibouti"),
    ("Dominica", "DM", "DMA", r"dominica"),
    ("Dominican Republic", "DO", "DOM", r"dominican republic"),
    ("Ecuador", "EC", "ECU", r"ecuador"),
    ("Egypt", "EG", "EGY", r"egypt|arab republic of egypt"),
    ("El Salvador", "SV", "SLV", r"el salvador"),
    ("Equatorial Guinea", "GQ", "GNQ", r"equatorial guinea"),
    ("Eritrea", "ER", "ERI", r"eritrea"),
    ("Estonia", "EE", "EST", r"estonia"),
    ("Eswatini", "SZ", "SWZ", r"eswatini|swaziland|kingdom of eswatini"),
    ("Ethiopia", "ET", "ETH", r"ethiopia"),
    ("Falkland Islands", "FK", "FLK", r"falkland islands(, malvinas)?|malvinas"),
    ("Faroe Islands", "FO", "FRO", r"fa(e)?roe islands"),
    ("Fiji", "FJ", "FJI", r"fiji"),
    ("Finland", "FI", "FIN", r"finland"),
    ("France", "FR", "FRA", r"france|french republic"),
    ("French Guiana", "GF", "GUF", r"french guiana"),
    ("French Polynesia", "PF", "PYF", r"french polynesia"),
    ("French Southern Territories", "TF", "ATF", r"french southern( and antarctic)? (territories|lands)"),
    ("Gabon", "GA", "GAB", r"gabon"),
    ("Gambia", "GM", "GMB", r"(the )?gambia(, the)?"),
    ("Georgia", "GE", "GEO", r"georgia"),
    ("Germany", "DE", "DEU", r"germany|deutschland|federal republic of germany"),
    ("Ghana", "GH", "GHA", r"ghana"),
    ("Gibraltar", "GI", "GIB", r"gibraltar"),
    ("Greece", "GR", "GRC", r"greece|hellenic republic"),
    ("Greenland", "GL", "GRL", r"greenland"),
    ("Grenada", "GD", "GRD", r"grenada"),
    ("Guadeloupe", "GP", "GLP", r"guadeloupe"),
    ("Guam", "GU", "GUM", r"guam"),
    ("Guatemala", "GT", "GTM", r"guatemala"),
    ("Guernsey", "GG", "GGY", r"guernsey"),
    ("Guinea", "GN", "GIN", r"guinea"),
    ("Guinea-Bissau", "GW", "GNB", r"guinea[- ]bissau"),
    ("Guyana", "GY", "GUY", r"guyana"),
    ("Haiti", "HT", "HTI", r"haiti"),
    ("Heard and McDonald Islands", "HM", "HMD", r"heard( island)? (and|&) mcdonald islands"),
    ("Vatican", "VA", "VAT", r"holy see(, vatican city state)?|vatican( city( state)?)?"),
    ("Honduras", "HN", "HND", r"honduras"),
    ("Hong Kong", "HK", "HKG", r"hong kong( sar)?(,? china)?"),
    ("Hungary", "HU", "HUN", r"hungary"),
    ("Iceland", "IS", "ISL", r"iceland"),
    ("India", "IN", "IND", r"india"),
    ("Indonesia", "ID", "IDN", r"indonesia"),
    ("Iran", "IR", "IRN", r"iran(,? islamic republic of)?|islamic republic of iran"),
    ("Iraq", "IQ", "IRQ", r"iraq"),
    ("Ireland", "IE", "IRL", r"ireland|republic of ireland|eire"),
    ("Isle of Man", "IM", "IMN", r"isle of man"),
    ("Israel", "IL", "ISR", r"israel"),
    ("Italy", "IT", "ITA", r"italy|italian republic"),
    ("Jamaica", "JM", "JAM", r"jamaica"),
    ("Japan", "JP", "JPN", r"japan"),
    ("Jersey", "JE", "JEY", r"jersey"),
    ("Jordan", "JO", "JOR", r"jordan"),
    ("Kazakhstan", "KZ", "KAZ", r"kazakhstan"),
    ("Kenya", "KE", "KEN", r"kenya"),
    ("Kiribati", "KI", "KIR", r"kiribati"),
    ("North Korea", "KP", "PRK", r"north korea|korea,? democratic people'?s republic of|democratic people'?s republic of korea|dprk"),
    ("South Korea", "KR", "KOR", r"south korea|korea(,? (republic of|rep\.?))?|republic of korea"),
    ("Kosovo", "XK", "XKX", r"kosovo"),
    ("Kuwait", "KW", "KWT", r"kuwait"),
    ("Kyrgyzstan", "KG", "KGZ", r"kyrgyzstan|kyrgyz republic"),
    ("Laos", "LA", "LAO", r"laos|lao people'?s democratic republic|lao pdr"),
    ("Latvia", "LV", "LVA", r"latvia"),
    ("Lebanon", "LB", "LBN", r"lebanon"),
    ("Lesotho", "LS", "LSO", r"lesotho"),
    ("Liberia", "LR", "LBR", r"liberia"),
    ("Libya", "LY", "LBY", r"libya|libyan arab jamahiriya|state of libya"),
    ("Liechtenstein", "LI", "LIE", r"liechtenstein"),
    ("Lithuania", "LT", "LTU", r"lithuania"),
    ("Luxembourg", "LU", "LUX", r"luxembourg"),
    ("Macau", "MO", "MAC", r"maca[ou]( sar)?(,? china)?"),
    ("Madagascar", "MG", "MDG", r"madagascar"),
    ("Malawi", "MW", "MWI", r"malawi"),
    ("Malaysia", "MY", "MYS", r"malaysia"),
    ("Maldives", "MV", "MDV", r"maldives"),
    ("Mali", "ML", "MLI", r"mali"),
    ("Malta", "MT", "MLT", r"malta"),
    ("Marshall Islands", "MH", "MHL", r"marshall islands"),
    ("Martinique", "MQ", "MTQ", r"martinique"),
    ("Mauritania", "MR", "MRT", r"mauritania"),
    ("Mauritius", "MU", "MUS", r"mauritius"),
    ("Mayotte", "YT", "MYT", r"mayotte"),
    ("Mexico", "MX", "MEX", r"mexico|united mexican states"),
    ("Micronesia", "FM", "FSM", r"micronesia(,? federated states of)?|federated states of micronesia"),
    ("Moldova", "MD", "MDA", r"moldova(,? republic of)?|republic of moldova"),
    ("Monaco", "MC", "MCO", r"monaco"),
    ("Mongolia", "MN", "MNG", r"mongolia"),
    ("Montenegro", "ME", "MNE", r"montenegro"),
    ("Montserrat", "MS", "MSR", r"montserrat"),
    ("Morocco", "MA", "MAR", r"morocco"),
    ("Mozambique", "MZ", "MOZ", r"mozambique"),
    ("Myanmar", "MM", "MMR", r"myanmar|burma"),
    ("Namibia", "NA", "NAM", r"namibia"),
    ("Nauru", "NR", "NRU", r"nauru"),
    ("Nepal", "NP", "NPL", r"nepal"),
    ("Netherlands", "NL", "NLD", r"(the )?netherlands(, kingdom of( the)?)?|kingdom of the netherlands|holland"),
    ("New Caledonia", "NC", "NCL", r"new caledonia"),
    ("New Zealand", "NZ", "NZL", r"new zealand"),
    ("Nicaragua", "NI", "NIC", r"nicaragua"),
    ("Niger", "NE", "NER", r"niger"),
    ("Nigeria", "NG", "NGA", r"nigeria"),
    ("Niue", "NU", "NIU", r"niue"),
    ("Norfolk Island", "NF", "NFK", r"norfolk island"),
    ("North Macedonia", "MK", "MKD", r"(north )?macedonia(,? (the former yugoslav )?republic of)?|republic of north macedonia"),
    ("Northern Mariana Islands", "MP", "MNP", r"northern mariana islands"),
    ("Norway", "NO", "NOR", r"norway"),
    ("Oman", "OM", "OMN", r"oman"),
    ("Pakistan", "PK", "PAK", r"pakistan"),
    ("Palau", "PW", "PLW", r"palau"),
    ("Palestine", "PS", "PSE", r"palestine(,? state of)?|state of palestine|palestinian territor(y|ies)(,? occupied)?"),
    ("Panama", "PA", "PAN", r"panama"),
    ("Papua New Guinea", "PG", "PNG", r"papua new guinea"),
    ("Paraguay", "PY", "PRY", r"paraguay"),
    ("Peru", "PE", "PER", r"peru"),
    ("Philippines", "PH", "PHL", r"(the )?philippines"),
    ("Pitcairn", "PN", "PCN", r"pitcairn( islands)?"),
    ("Poland", "PL", "POL", r"poland"),
    ("Portugal", "PT", "PRT", r"portugal"),
    ("Puerto Rico", "PR", "PRI", r"puerto rico"),
    ("Qatar", "QA", "QAT", r"qatar"),
    ("Reunion", "RE", "REU", r"r[eé]union"),
    ("Romania", "RO", "ROU", r"romania"),
    ("Russia", "RU", "RUS", r"russia|russian federation"),
    ("Rwanda", "RW", "RWA", r"rwanda"),
    ("Saint Barthelemy", "BL", "BLM", r"(saint|st\.?) barth[eé]lemy"),
    ("Saint Helena", "SH", "SHN", r"(saint|st\.?) helena(,? ascension,? (and|&) tristan da cunha)?"),
    ("Saint Kitts and Nevis", "KN", "KNA", r"(saint|st\.?) kitts( (and|&) nevis)?"),
    ("Saint Lucia", "LC", "LCA", r"(saint|st\.?) lucia"),
    ("Saint Martin", "MF", "MAF", r"(saint|st\.?) martin(, french part)?"),
    ("Saint Pierre and Miquelon", "PM", "SPM", r"(saint|st\.?) pierre (and|&) miquelon"),
    ("Saint Vincent and the Grenadines", "VC", "VCT", r"(saint|st\.?) vincent( (and|&) (the )?grenadines)?"),
    ("Samoa", "WS", "WSM", r"samoa|western samoa"),
    ("San Marino", "SM", "SMR", r"san marino"),
    ("Sao Tome and Principe", "ST", "STP", r"s[aã]o tom[eé] (and|&) pr[ií]ncipe"),
    ("Saudi Arabia", "SA", "SAU", r"saudi arabia|kingdom of saudi arabia"),
    ("Senegal", "SN", "SEN", r"senegal"),
    ("Serbia", "RS", "SRB", r"serbia"),
    ("Seychelles", "SC", "SYC", r"seychelles"),
    ("Sierra Leone", "SL", "SLE", r"sierra leone"),
    ("Singapore", "SG", "SGP", r"singapore"),
    ("Sint Maarten", "SX", "SXM", r"sint maarten(, dutch part)?"),
    ("Slovakia", "SK", "SVK", r"slovakia|slovak republic"),
    ("Slovenia", "SI", "SVN", r"slovenia"),
    ("Solomon Islands", "SB", "SLB", r"solomon islands"),
    ("Somalia", "SO", "SOM", r"somalia"),
    ("South Africa", "ZA", "ZAF", r"south africa|republic of south africa"),
    ("South Georgia and South Sandwich Islands", "GS", "SGS", r"south georgia( (and|&) (the )?south sandwich islands)?"),
    ("South Sudan", "SS", "SSD", r"south sudan"),
    ("Spain", "ES", "ESP", r"spain|espa[nñ]a"),
    ("Sri Lanka", "LK", "LKA", r"sri lanka"),
    ("Sudan", "SD", "SDN", r"sudan"),
    ("Suriname", "SR", "SUR", r"suriname?"),
    ("Svalbard and Jan Mayen", "SJ", "SJM", r"svalbard( (and|&) jan mayen( islands)?)?"),
    ("Sweden", "SE", "SWE", r"sweden"),
    ("Switzerland", "CH", "CHE", r"switzerland|swiss confederation"),
    ("Syria", "SY", "SYR", r"syria|syrian arab republic"),
    ("Taiwan", "TW", "TWN", r"taiwan(,? province of china)?|republic of china"),
    ("Tajikistan", "TJ", "TJK", r"tajikistan"),
    ("Tanzania", "TZ", "TZA", r"tanzania(,? united republic of)?|united republic of tanzania"),
    ("Thailand", "TH", "THA", r"thailand"),
    ("Timor-Leste", "TL", "TLS", r"timor[- ]leste|east timor"),
    ("Togo", "TG", "TGO", r"togo"),
    ("Tokelau", "TK", "TKL", r"tokelau"),
    ("Tonga", "TO", "TON", r"tonga"),
    ("Trinidad and Tobago", "TT", "TTO", r"trinidad( (and|&) tobago)?"),
    ("Tunisia", "TN", "TUN", r"tunisia"),
    ("Turkey", "TR", "TUR", r"turkey|t[uü]rkiye"),
    ("Turkmenistan", "TM", "TKM", r"turkmenistan"),
    ("Turks and Caicos Islands", "TC", "TCA", r"turks (and|&) caicos( islands)?"),
    ("Tuvalu", "TV", "TUV", r"tuvalu"),
    ("Uganda", "UG", "UGA", r"uganda"),
    ("Ukraine", "UA", "UKR", r"ukraine"),
    ("United Arab Emirates", "AE", "ARE", r"united arab emirates|uae"),
    ("United Kingdom", "GB", "GBR", r"united kingdom( of great britain (and|&) northern ireland)?|uk|u\.k\.|great britain|britain|england"),
    ("United States", "US", "USA", r"united states( of america)?|usa?|u\.s\.(a\.)?|america"),
    ("United States Minor Outlying Islands", "UM", "UMI", r"united states minor outlying islands|u\.?s\.? minor outlying islands"),
    ("Uruguay", "UY", "URY", r"uruguay"),
    ("Uzbekistan", "UZ", "UZB", r"uzbekistan"),
    ("Vanuatu", "VU", "VUT", r"vanuatu"),
    ("Venezuela", "VE", "VEN", r"venezuela(,? bolivarian republic of)?|bolivarian republic of venezuela"),
    ("Vietnam", "VN", "VNM", r"viet ?nam"),
    ("British Virgin Islands", "VG", "VGB", r"british virgin islands|virgin islands,? british"),
    ("United States Virgin Islands", "VI", "VIR", r"united states virgin islands|u\.?s\.? virgin islands|virgin islands,? u\.?s\.?"),
    ("Wallis and Futuna", "WF", "WLF", r"wallis( (and|&) futuna( islands)?)?"),
    ("Western Sahara", "EH", "ESH", r"western sahara"),
    ("Yemen", "YE", "YEM", r"yemen"),
    ("Zambia", "ZM", "ZMB", r"zambia"),
    ("Zimbabwe", "ZW", "ZWE", r"zimbabwe"),
];

static COUNTRIES: Lazy<Vec<Country>> = Lazy::new(|| {
    TABLE
        .iter()
        .map(|&(name, iso2, iso3, pattern)| Country {
            name,
            iso2,
            iso3,
            pattern: Regex::new(&format!("(?i)^(?:{pattern})$")).expect("static pattern"),
        })
        .collect()
});

static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));
static TRAILING_QUALIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(\s*([^()]*?)\s*\)$").expect("static pattern"));
static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").expect("static pattern"));

/// Collapse whitespace, straighten apostrophes and turn a trailing
/// `Name (Qualifier)` into `Name, Qualifier`.
fn canonicalize(raw: &str) -> String {
    let s = SPACES.replace_all(raw.trim(), " ").replace('\u{2019}', "'");
    let s = TRAILING_QUALIFIER.replace(&s, "$1, $2");
    COMMA.replace_all(&s, ", ").into_owned()
}

/// Built-in ISO 3166 alias table: exact alpha-2/alpha-3 codes first, then
/// the first name pattern that matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinAliases;

impl CountryConverter for BuiltinAliases {
    fn convert(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(c) = COUNTRIES.iter().find(|c| c.iso2 == raw || c.iso3 == raw) {
            return Some(c.name.to_string());
        }
        let canonical = canonicalize(raw);
        COUNTRIES
            .iter()
            .find(|c| c.pattern.is_match(&canonical))
            .or_else(|| COUNTRIES.iter().find(|c| c.pattern.is_match(raw)))
            .map(|c| c.name.to_string())
    }
}
